//! Line-level document edits applied by the synchronizer.
//!
//! Each function takes the full document text and returns the edited text,
//! or `None` when the target line cannot be edited. Lines are split on `\n`
//! and rejoined the same way, so untouched lines come back byte-for-byte.

use crate::extract::{TaskLine, strip_due_date};
use crate::types::DUE_MARKER;

/// Headings new tasks are inserted under. `# Tasks` also matches inside
/// `## Tasks`, so one search covers both.
const TASKS_HEADING: &str = "# Tasks";

/// Flip the checkbox on `line_number`.
///
/// `None` if the line is out of range or no longer a task.
pub fn toggle_line(content: &str, line_number: usize) -> Option<String> {
    replace_line(content, line_number, |line| {
        let task = TaskLine::parse(line)?;
        Some(task.render(!task.completed))
    })
}

/// Set the due date on `line_number`, replacing any existing one.
pub fn postpone_line(content: &str, line_number: usize, new_date: &str) -> Option<String> {
    replace_line(content, line_number, |line| Some(with_due_date(line, new_date)))
}

/// Rewrite one line's due date. A line ending in `]` (a checkbox with no
/// text) gets the date inside the bracket.
pub fn with_due_date(line: &str, new_date: &str) -> String {
    let stripped = strip_due_date(line);
    let line = stripped.trim_end();
    match line.strip_suffix(']') {
        Some(head) => format!("{} {} {}]", head, DUE_MARKER, new_date),
        None => format!("{} {} {}", line, DUE_MARKER, new_date),
    }
}

/// Add an open task under the first tasks heading, or in a new tasks
/// section at the end of the document.
pub fn insert_task(content: &str, text: &str) -> String {
    let task = format!("- [ ] {}", text);
    match content.find(TASKS_HEADING) {
        Some(pos) => {
            let at = pos + TASKS_HEADING.len();
            format!("{}\n{}{}", &content[..at], task, &content[at..])
        }
        None => format!("{}\n\n## Tasks\n{}", content, task),
    }
}

fn replace_line<F>(content: &str, line_number: usize, edit: F) -> Option<String>
where
    F: FnOnce(&str) -> Option<String>,
{
    let mut lines: Vec<&str> = content.split('\n').collect();
    let replacement = edit(lines.get(line_number)?)?;
    lines[line_number] = &replacement;
    Some(lines.join("\n"))
}
