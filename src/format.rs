//! Output formatting utilities for markdown and JSON.

use crate::sync::SyncReport;
use crate::types::{DUE_MARKER, SCHEDULED_MARKER, START_MARKER, TaskRecord};
use std::collections::BTreeMap;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Format a single task as one markdown checklist line, metadata restored.
pub fn format_task_markdown(task: &TaskRecord) -> String {
    let mut md = format!(
        "- [{}] {}",
        if task.completed { 'x' } else { ' ' },
        task.text
    );

    if let Some(symbol) = task.priority.symbol() {
        md.push_str(&format!(" {}", symbol));
    }
    if let Some(ref due) = task.due_date {
        md.push_str(&format!(" {} {}", DUE_MARKER, due));
    }
    if let Some(ref scheduled) = task.scheduled_date {
        md.push_str(&format!(" {} {}", SCHEDULED_MARKER, scheduled));
    }
    if let Some(ref start) = task.start_date {
        md.push_str(&format!(" {} {}", START_MARKER, start));
    }

    md.push_str(&format!(" `{}`", task.id));
    md
}

/// Format a list of tasks as markdown, grouped by document.
pub fn format_tasks_markdown(tasks: &[TaskRecord]) -> String {
    let mut md = format!("# Tasks ({})\n", tasks.len());

    let mut by_document: BTreeMap<&str, Vec<&TaskRecord>> = BTreeMap::new();
    for task in tasks {
        by_document
            .entry(task.document_path.as_str())
            .or_default()
            .push(task);
    }

    for (path, group) in by_document {
        md.push_str(&format!("\n## {}\n", path));
        for task in group {
            md.push_str(&format_task_markdown(task));
            md.push('\n');
        }
    }

    md
}

pub fn format_tasks_json(tasks: &[TaskRecord]) -> String {
    serde_json::to_string_pretty(tasks).unwrap_or_else(|_| "[]".to_string())
}

pub fn format_tasks(tasks: &[TaskRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_tasks_json(tasks),
        OutputFormat::Markdown => format_tasks_markdown(tasks),
    }
}

/// Format a sync report as markdown.
pub fn format_sync_report_markdown(report: &SyncReport) -> String {
    let mut md = String::from("# Sync\n\n| | applied | skipped | failed |\n|---|---|---|---|\n");
    for (label, category) in [
        ("toggles", &report.toggles),
        ("postpones", &report.postpones),
        ("new tasks", &report.new_tasks),
    ] {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            label, category.applied, category.skipped, category.failed
        ));
    }
    if let Some(ref document) = report.intake_document {
        md.push_str(&format!("\nNew tasks added to `{}`\n", document));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_markdown_groups_by_document() {
        let mut tasks = extract("- [ ] b task 🔺 📅 2024-01-02", "b.md");
        tasks.extend(extract("- [x] a task", "a.md"));
        let md = format_tasks_markdown(&tasks);
        assert!(md.starts_with("# Tasks (2)\n"));
        let a = md.find("## a.md").unwrap();
        let b = md.find("## b.md").unwrap();
        assert!(a < b);
        assert!(md.contains("- [x] a task `a.md:0`"));
        assert!(md.contains("- [ ] b task 🔺 📅 2024-01-02 `b.md:0`"));
    }

    #[test]
    fn test_json_uses_camel_case() {
        let tasks = extract("- [ ] x 📅 2024-01-02", "a.md");
        let json = format_tasks_json(&tasks);
        assert!(json.contains("\"dueDate\": \"2024-01-02\""));
        assert!(json.contains("\"documentPath\": \"a.md\""));
    }

    #[test]
    fn test_sync_report_table() {
        let mut report = SyncReport::default();
        report.toggles.applied = 2;
        report.postpones.skipped = 1;
        let md = format_sync_report_markdown(&report);
        assert!(md.contains("| toggles | 2 | 0 | 0 |"));
        assert!(md.contains("| postpones | 0 | 1 | 0 |"));
        assert!(!md.contains("New tasks added"));
    }
}
