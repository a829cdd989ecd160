//! Core types for task extraction and synchronization.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Due date marker.
pub const DUE_MARKER: &str = "📅";
/// Scheduled date marker.
pub const SCHEDULED_MARKER: &str = "⏳";
/// Start date marker.
pub const START_MARKER: &str = "🛫";

/// Task priority, derived from a single marker symbol in the task text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Highest,
}

impl Priority {
    /// All marker symbols that carry a priority.
    pub const MARKERS: [char; 4] = ['⏫', '🔺', '🔼', '🔽'];

    /// Map a marker symbol to its priority level.
    pub fn from_marker(symbol: char) -> Option<Self> {
        match symbol {
            '⏫' => Some(Priority::Highest),
            '🔺' => Some(Priority::High),
            '🔼' => Some(Priority::Medium),
            '🔽' => Some(Priority::Low),
            _ => None,
        }
    }

    /// Marker symbol for this priority, if any.
    pub fn symbol(&self) -> Option<char> {
        match self {
            Priority::Highest => Some('⏫'),
            Priority::High => Some('🔺'),
            Priority::Medium => Some('🔼'),
            Priority::Low => Some('🔽'),
            Priority::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Highest => "highest",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one task occurrence: `<documentPath>:<lineNumber>`.
///
/// Derived from where the task sat at extraction time. Edits that shift lines
/// in the document make an older id point at a different line; consumers
/// re-check the checkbox grammar at the target line but cannot detect that a
/// different task moved into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(document_path: &str, line_number: usize) -> Self {
        Self(format!("{}:{}", document_path, line_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the id into `(document_path, line_number)`.
    ///
    /// The split happens at the last colon so that paths containing colons
    /// still resolve; there is no escaping beyond that.
    pub fn resolve(&self) -> Result<(&str, usize)> {
        let (path, line) = self
            .0
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidTaskId(self.0.clone()))?;
        if path.is_empty() {
            return Err(Error::InvalidTaskId(self.0.clone()));
        }
        let line = line
            .parse::<usize>()
            .map_err(|_| Error::InvalidTaskId(self.0.clone()))?;
        Ok((path, line))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One task occurrence extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    /// Description with every metadata marker removed.
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub document_path: String,
    /// 0-based line offset at extraction time.
    pub line_number: usize,
}

/// An edit produced by the remote viewer, applied once by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingChange {
    /// Flip completion state.
    Toggle { task_id: TaskId },
    /// Replace or insert the due date.
    Postpone { task_id: TaskId, new_date: String },
    /// Insert a new task into today's intake document.
    NewTask { text: String },
}

impl PendingChange {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingChange::Toggle { .. } => "toggle",
            PendingChange::Postpone { .. } => "postpone",
            PendingChange::NewTask { .. } => "new_task",
        }
    }
}
