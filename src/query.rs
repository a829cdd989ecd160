//! Fixed-vocabulary task queries.
//!
//! A query is a block of lines. Each line is lower-cased and checked for a
//! set of known phrases by substring match; every phrase found becomes one
//! [`Clause`]. A task survives the query only if it satisfies every clause.
//! Lines with no known phrase (`short mode`, `hide task count`, typos) are
//! display directives or noise and never filter anything.
//!
//! Date clauses compare `YYYY-MM-DD` strings lexically and only apply when
//! the task carries that date: a task with no due date passes `due after
//! today`.

use crate::types::{Priority, TaskRecord};
use chrono::{Days, NaiveDate};

/// Date format shared by task markers and query bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recognized filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    NotDone,
    /// Keeps completed tasks. No completion date is tracked, so this is
    /// "completed at all", not "completed on the current day".
    DoneToday,
    StartsBeforeTomorrow,
    DueOnOrBeforeTomorrow,
    ScheduledBeforeTomorrow,
    PriorityAboveMedium,
    PriorityIsMedium,
    DueAfterToday,
    DueWithinThreeDays,
}

impl Clause {
    /// Phrases in evaluation order.
    pub const VOCABULARY: [(&'static str, Clause); 9] = [
        ("not done", Clause::NotDone),
        ("done today", Clause::DoneToday),
        ("starts before tomorrow", Clause::StartsBeforeTomorrow),
        ("due on or before tomorrow", Clause::DueOnOrBeforeTomorrow),
        ("scheduled before tomorrow", Clause::ScheduledBeforeTomorrow),
        ("priority is above medium", Clause::PriorityAboveMedium),
        ("priority is medium", Clause::PriorityIsMedium),
        ("due after today", Clause::DueAfterToday),
        ("due within 3 days", Clause::DueWithinThreeDays),
    ];

    /// Every clause whose phrase occurs in `line`.
    pub fn recognize(line: &str) -> impl Iterator<Item = Clause> + use<> {
        let line = line.trim().to_lowercase();
        Self::VOCABULARY
            .into_iter()
            .filter(move |(phrase, _)| line.contains(phrase))
            .map(|(_, clause)| clause)
    }

    /// Does `task` satisfy this clause?
    pub fn matches(&self, task: &TaskRecord, window: &DateWindow) -> bool {
        match self {
            Clause::NotDone => !task.completed,
            Clause::DoneToday => task.completed,
            Clause::StartsBeforeTomorrow => {
                date_passes(&task.start_date, |d| d < window.tomorrow.as_str())
            }
            Clause::DueOnOrBeforeTomorrow => {
                date_passes(&task.due_date, |d| d <= window.tomorrow.as_str())
            }
            Clause::ScheduledBeforeTomorrow => {
                date_passes(&task.scheduled_date, |d| d < window.tomorrow.as_str())
            }
            Clause::PriorityAboveMedium => {
                matches!(task.priority, Priority::High | Priority::Highest)
            }
            Clause::PriorityIsMedium => task.priority == Priority::Medium,
            Clause::DueAfterToday => date_passes(&task.due_date, |d| d > window.today.as_str()),
            Clause::DueWithinThreeDays => {
                date_passes(&task.due_date, |d| d <= window.three_days.as_str())
            }
        }
    }
}

/// Absent dates always pass.
fn date_passes(date: &Option<String>, keep: impl Fn(&str) -> bool) -> bool {
    date.as_deref().is_none_or(keep)
}

/// Calendar bounds used by date clauses, formatted for lexical comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pub today: String,
    pub tomorrow: String,
    pub three_days: String,
}

impl DateWindow {
    pub fn new(today: NaiveDate) -> Self {
        let offset = |days: u64| {
            today
                .checked_add_days(Days::new(days))
                .unwrap_or(NaiveDate::MAX)
                .format(DATE_FORMAT)
                .to_string()
        };
        Self {
            today: offset(0),
            tomorrow: offset(1),
            three_days: offset(3),
        }
    }
}

/// A parsed query: its clauses in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn parse(query_text: &str) -> Self {
        Self {
            clauses: query_text.split('\n').flat_map(Clause::recognize).collect(),
        }
    }

    pub fn matches(&self, task: &TaskRecord, window: &DateWindow) -> bool {
        self.clauses.iter().all(|clause| clause.matches(task, window))
    }

    pub fn filter(&self, tasks: &[TaskRecord], today: NaiveDate) -> Vec<TaskRecord> {
        let window = DateWindow::new(today);
        tasks
            .iter()
            .filter(|task| self.matches(task, &window))
            .cloned()
            .collect()
    }
}

/// Filter `tasks` through `query_text`, relative to `today`.
pub fn filter(tasks: &[TaskRecord], query_text: &str, today: NaiveDate) -> Vec<TaskRecord> {
    Query::parse(query_text).filter(tasks, today)
}
