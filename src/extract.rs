//! Task extraction from markdown text.
//!
//! A task is any line matching `^(\s*)-\s*\[([ x])\]\s*(.+)$`. Metadata is
//! carried inline as emoji markers: one priority symbol and up to three date
//! markers, each followed by a `YYYY-MM-DD` date. Lines that do not match are
//! ignored; extraction never fails.

use crate::types::{DUE_MARKER, Priority, SCHEDULED_MARKER, START_MARKER, TaskId, TaskRecord};
use regex_lite::Regex;
use std::sync::LazyLock;

static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s*\[([ x])\]\s*(.+)$").expect("task line pattern"));

static HAS_TASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*-\s*\[[ x]\]").expect("task probe pattern"));

static DUE: LazyLock<Regex> = LazyLock::new(|| date_pattern(DUE_MARKER));
static SCHEDULED: LazyLock<Regex> = LazyLock::new(|| date_pattern(SCHEDULED_MARKER));
static START: LazyLock<Regex> = LazyLock::new(|| date_pattern(START_MARKER));

fn date_pattern(marker: &str) -> Regex {
    Regex::new(&format!(r"{}\s*(\d{{4}}-\d{{2}}-\d{{2}})", marker)).expect("date marker pattern")
}

/// The parts of a checkbox line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine<'a> {
    pub indent: &'a str,
    pub completed: bool,
    /// Everything after the checkbox, markers included.
    pub body: &'a str,
}

impl<'a> TaskLine<'a> {
    /// Match a single line against the task grammar.
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = TASK_LINE.captures(line)?;
        Some(Self {
            indent: caps.get(1).map_or("", |m| m.as_str()),
            completed: caps.get(2).is_some_and(|m| m.as_str() == "x"),
            body: caps.get(3).map_or("", |m| m.as_str()),
        })
    }

    /// Rebuild the line with the given completion state.
    ///
    /// Spacing between the dash, checkbox and body is normalized.
    pub fn render(&self, completed: bool) -> String {
        let mark = if completed { 'x' } else { ' ' };
        format!("{}- [{}] {}", self.indent, mark, self.body)
    }
}

/// Extract every task in `text`, tagging each with its origin.
pub fn extract(text: &str, document_path: &str) -> Vec<TaskRecord> {
    text.split('\n')
        .enumerate()
        .filter_map(|(index, line)| {
            let task = TaskLine::parse(line)?;
            Some(TaskRecord {
                id: TaskId::new(document_path, index),
                text: clean_text(task.body),
                completed: task.completed,
                priority: extract_priority(task.body),
                due_date: extract_date(&DUE, task.body),
                scheduled_date: extract_date(&SCHEDULED, task.body),
                start_date: extract_date(&START, task.body),
                document_path: document_path.to_string(),
                line_number: index,
            })
        })
        .collect()
}

/// True if any line of `text` starts with a checkbox.
pub fn contains_tasks(text: &str) -> bool {
    HAS_TASK.is_match(text)
}

/// First priority marker in the text decides the priority.
pub fn extract_priority(text: &str) -> Priority {
    text.chars()
        .find_map(Priority::from_marker)
        .unwrap_or_default()
}

fn extract_date(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip priority markers and dated markers, then trim.
pub fn clean_text(text: &str) -> String {
    let without_priority: String = text
        .chars()
        .filter(|c| !Priority::MARKERS.contains(c))
        .collect();
    let stripped = [&*DUE, &*SCHEDULED, &*START]
        .iter()
        .fold(without_priority, |acc, re| re.replace_all(&acc, "").into_owned());
    stripped.trim().to_string()
}

/// Remove the first due marker and its date from a line.
pub fn strip_due_date(line: &str) -> String {
    DUE.replace(line, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_open_task() {
        let tasks = extract("# Groceries\n- [ ] buy milk\n", "list.md");
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert!(!task.completed);
        assert_eq!(task.text, "buy milk");
        assert_eq!(task.priority, Priority::None);
        assert_eq!(task.id.as_str(), "list.md:1");
        assert_eq!(task.line_number, 1);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn test_completed_task_with_metadata() {
        let tasks = extract("- [x] call mom ⏫ 📅 2024-01-10", "todo.md");
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert!(task.completed);
        assert_eq!(task.priority, Priority::Highest);
        assert_eq!(task.due_date.as_deref(), Some("2024-01-10"));
        assert_eq!(task.text, "call mom");
    }

    #[test]
    fn test_all_date_kinds() {
        let line = "- [ ] plan trip 🛫 2024-02-01 ⏳2024-02-03 📅 2024-02-10";
        let task = &extract(line, "a.md")[0];
        assert_eq!(task.start_date.as_deref(), Some("2024-02-01"));
        assert_eq!(task.scheduled_date.as_deref(), Some("2024-02-03"));
        assert_eq!(task.due_date.as_deref(), Some("2024-02-10"));
        assert_eq!(task.text, "plan trip");
    }

    #[test]
    fn test_first_priority_marker_wins() {
        let task = &extract("- [ ] triage 🔽 later 🔺", "a.md")[0];
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.text, "triage  later");
    }

    #[test]
    fn test_marker_without_date_is_kept_in_text() {
        let task = &extract("- [ ] ship it 📅 soon", "a.md")[0];
        assert_eq!(task.due_date, None);
        assert_eq!(task.text, "ship it 📅 soon");
    }

    #[test]
    fn test_non_task_lines_ignored() {
        let text = "- plain bullet\n-[] nope\n* [ ] star bullet\n  - [ ] nested\n- [X] upper x";
        let tasks = extract(text, "a.md");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "nested");
        assert_eq!(tasks[0].line_number, 3);
    }

    #[test]
    fn test_empty_checkbox_body_is_not_a_task() {
        assert!(extract("- [ ]", "a.md").is_empty());
        // Trailing whitespace satisfies `.+`, leaving an empty description.
        let tasks = extract("- [ ]   ", "a.md");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "");
    }

    #[test]
    fn test_task_line_render_flips_mark() {
        let line = "  -  [ ]   water plants";
        let parsed = TaskLine::parse(line).unwrap();
        assert_eq!(parsed.indent, "  ");
        assert!(!parsed.completed);
        assert_eq!(parsed.render(true), "  - [x] water plants");
    }

    #[test]
    fn test_contains_tasks() {
        assert!(contains_tasks("# Notes\n\n  - [x] done thing\n"));
        assert!(!contains_tasks("# Notes\n- not a task\n"));
    }

    #[test]
    fn test_strip_due_date() {
        assert_eq!(
            strip_due_date("- [ ] pay rent 📅 2024-03-01 🔼"),
            "- [ ] pay rent  🔼"
        );
    }
}
