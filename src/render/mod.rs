//! Rendering filtered tasks for the remote viewer.
//!
//! [`render`] projects a task list into a [`DisplayFragment`], a plain data
//! structure that keeps each task's id so the viewer can address edits back
//! to it. [`DisplayFragment::to_html`] turns that into the markup embedded in
//! the published page.

pub mod page;

use crate::query::Query;
use crate::types::{DUE_MARKER, Priority, SCHEDULED_MARKER, START_MARKER, TaskId, TaskRecord};
use chrono::NaiveDate;
use regex_lite::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;

pub use page::{PageOptions, render_page};

/// Directive that hides metadata badges.
pub const SHORT_MODE: &str = "short mode";
/// Directive that hides the task count header.
pub const HIDE_TASK_COUNT: &str = "hide task count";

/// Postpone affordances offered per task: day offset and button label.
pub const POSTPONE_OFFSETS: [(u32, &str); 2] = [(1, "+1d"), (7, "+1w")];

static TASK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```tasks\n(.*?)\n```").expect("tasks block pattern"));

/// Display directives read from a query block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisplayFlags {
    pub short_mode: bool,
    pub hide_task_count: bool,
}

impl DisplayFlags {
    pub fn from_query(query_text: &str) -> Self {
        Self {
            short_mode: query_text.contains(SHORT_MODE),
            hide_task_count: query_text.contains(HIDE_TASK_COUNT),
        }
    }
}

/// One metadata badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub class: &'static str,
    pub label: String,
}

/// Postpone control for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostponeAction {
    pub days: u32,
    pub label: &'static str,
}

/// Addressable rendering of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub completed: bool,
    pub text: String,
    pub priority: Priority,
    pub badges: Vec<Badge>,
    pub actions: Vec<PostponeAction>,
}

/// Rendered task group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFragment {
    pub flags: DisplayFlags,
    pub items: Vec<TaskView>,
}

/// Project `tasks` into a fragment using the directives in `query_text`.
pub fn render(tasks: &[TaskRecord], query_text: &str) -> DisplayFragment {
    let flags = DisplayFlags::from_query(query_text);
    let items = tasks
        .iter()
        .map(|task| TaskView {
            id: task.id.clone(),
            completed: task.completed,
            text: task.text.clone(),
            priority: task.priority,
            badges: if flags.short_mode {
                Vec::new()
            } else {
                badges(task)
            },
            actions: POSTPONE_OFFSETS
                .iter()
                .map(|&(days, label)| PostponeAction { days, label })
                .collect(),
        })
        .collect();
    DisplayFragment { flags, items }
}

fn badges(task: &TaskRecord) -> Vec<Badge> {
    let mut badges = Vec::new();
    let dated = [
        ("due-date", DUE_MARKER, &task.due_date),
        ("scheduled-date", SCHEDULED_MARKER, &task.scheduled_date),
        ("start-date", START_MARKER, &task.start_date),
    ];
    for (class, marker, date) in dated {
        if let Some(date) = date {
            badges.push(Badge {
                class,
                label: format!("{} {}", marker, date),
            });
        }
    }
    if let Some(symbol) = task.priority.symbol() {
        badges.push(Badge {
            class: "priority",
            label: symbol.to_string(),
        });
    }
    badges
}

impl DisplayFragment {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut html = String::from(r#"<div class="task-group">"#);

        if !self.flags.hide_task_count {
            html.push_str(&format!(
                r#"<div class="task-count">{} tasks</div>"#,
                self.items.len()
            ));
        }

        for item in &self.items {
            let mut classes = vec!["task-item".to_string()];
            if item.priority != Priority::None {
                classes.push(format!("priority-{}", item.priority));
            }
            if item.completed {
                classes.push("completed".to_string());
            }
            let id = html_escape(item.id.as_str());

            html.push_str(&format!(
                r#"<div class="{}" data-task-id="{}">"#,
                classes.join(" "),
                id
            ));
            html.push_str(&format!(
                r#"<input type="checkbox" data-task-id="{}"{} onchange="toggleTask(this.dataset.taskId)">"#,
                id,
                if item.completed { " checked" } else { "" }
            ));
            html.push_str(&format!(
                r#"<span class="task-text">{}</span>"#,
                html_escape(&item.text)
            ));

            if !item.badges.is_empty() {
                html.push_str(r#"<div class="task-metadata">"#);
                for badge in &item.badges {
                    html.push_str(&format!(
                        r#"<span class="{}">{}</span>"#,
                        badge.class,
                        html_escape(&badge.label)
                    ));
                }
                html.push_str("</div>");
            }

            if !item.actions.is_empty() {
                html.push_str(r#"<div class="task-actions">"#);
                for action in &item.actions {
                    html.push_str(&format!(
                        r#"<button data-task-id="{}" onclick="postponeTask(this.dataset.taskId, {})">{}</button>"#,
                        id, action.days, action.label
                    ));
                }
                html.push_str("</div>");
            }

            html.push_str("</div>");
        }

        html.push_str("</div>");
        html
    }
}

/// Replace every fenced `tasks` block in `page` with its rendered result.
pub fn process_task_queries(page: &str, tasks: &[TaskRecord], today: NaiveDate) -> String {
    TASK_BLOCK
        .replace_all(page, |caps: &Captures<'_>| {
            let query_text = caps.get(1).map_or("", |m| m.as_str());
            let matched = Query::parse(query_text).filter(tasks, today);
            render(&matched, query_text).to_html()
        })
        .into_owned()
}

/// Escape text for HTML content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_render_full_mode() {
        let tasks = extract("- [ ] pay rent 🔺 📅 2024-01-05 🛫 2024-01-01", "bills.md");
        let fragment = render(&tasks, "not done");
        assert_eq!(fragment.len(), 1);
        let item = &fragment.items[0];
        assert_eq!(item.id.as_str(), "bills.md:0");
        let classes: Vec<&str> = item.badges.iter().map(|b| b.class).collect();
        assert_eq!(classes, vec!["due-date", "start-date", "priority"]);
        assert_eq!(item.badges[2].label, "🔺");
        assert_eq!(item.actions.len(), 2);
        assert_eq!(item.actions[1].days, 7);

        let html = fragment.to_html();
        assert!(html.contains(r#"<div class="task-count">1 tasks</div>"#));
        assert!(html.contains(r#"class="task-item priority-high""#));
        assert!(html.contains(r#"data-task-id="bills.md:0""#));
        assert!(html.contains("postponeTask(this.dataset.taskId, 1)"));
        assert!(html.contains("postponeTask(this.dataset.taskId, 7)"));
        assert!(html.contains("📅 2024-01-05"));
    }

    #[test]
    fn test_render_short_mode_and_hidden_count() {
        let tasks = extract("- [x] done thing ⏫ 📅 2024-01-05", "a.md");
        let fragment = render(&tasks, "short mode\nhide task count");
        assert!(fragment.flags.short_mode);
        assert!(fragment.items[0].badges.is_empty());
        assert_eq!(fragment.items[0].actions.len(), 2);

        let html = fragment.to_html();
        assert!(!html.contains("task-count"));
        assert!(!html.contains("task-metadata"));
        assert!(!html.contains("📅 2024-01-05"));
        // Postponing stays available in the compact view
        assert!(html.contains("task-actions"));
        assert!(html.contains("postponeTask(this.dataset.taskId, 1)"));
        assert!(html.contains("postponeTask(this.dataset.taskId, 7)"));
        assert!(html.contains(" checked"));
        assert!(html.contains("completed"));
    }

    #[test]
    fn test_render_escapes_text_and_ids() {
        let tasks = extract("- [ ] fix <script> & \"quotes\"", "it's.md");
        let html = render(&tasks, "").to_html();
        assert!(html.contains("fix &lt;script&gt; &amp; &quot;quotes&quot;"));
        assert!(html.contains(r#"data-task-id="it&#39;s.md:0""#));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_render_is_pure() {
        let tasks = extract("- [ ] a\n- [ ] b", "a.md");
        let first = render(&tasks, "short mode");
        let second = render(&tasks, "");
        assert!(first.flags.short_mode);
        assert!(!second.flags.short_mode);
        assert_eq!(second.items[0].actions.len(), 2);
    }

    #[test]
    fn test_process_task_queries_replaces_each_block() {
        let tasks = extract("- [ ] open one\n- [x] closed one 🔼", "a.md");
        let page = concat!(
            "# Today\n```tasks\nnot done\n```\n\n",
            "## Medium\n```tasks\npriority is medium\nshort mode\n```\n",
        );
        let out = process_task_queries(page, &tasks, today());
        assert!(!out.contains("```"));
        assert!(out.starts_with("# Today\n<div class=\"task-group\">"));
        assert_eq!(out.matches("task-group").count(), 2);
        assert!(out.contains("open one"));
        assert!(out.contains("closed one"));
        assert_eq!(out.matches("1 tasks").count(), 2);
    }

    #[test]
    fn test_process_task_queries_leaves_other_fences() {
        let page = "```rust\nfn main() {}\n```";
        assert_eq!(process_task_queries(page, &[], today()), page);
    }
}
