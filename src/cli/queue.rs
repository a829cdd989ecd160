//! Queue subcommands: the producer side of the change log.

use crate::query::DATE_FORMAT;
use crate::types::{PendingChange, TaskId};
use chrono::NaiveDate;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Flip a task's checkbox
    Toggle {
        /// Task id, `<document path>:<line>`
        task_id: String,
    },

    /// Set a task's due date
    Postpone(PostponeArgs),

    /// Add a task to today's intake document
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct PostponeArgs {
    /// Task id, `<document path>:<line>`
    pub task_id: String,

    /// Days from today
    #[arg(long, conflicts_with = "date", required_unless_present = "date")]
    pub days: Option<u64>,

    /// Explicit date, YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,
}

impl QueueCommand {
    /// Build the change to append, resolving relative dates against `today`.
    pub fn to_change(&self, today: NaiveDate) -> anyhow::Result<PendingChange> {
        match self {
            QueueCommand::Toggle { task_id } => Ok(PendingChange::Toggle {
                task_id: checked_id(task_id)?,
            }),
            QueueCommand::Postpone(args) => {
                let new_date = match (&args.date, args.days) {
                    (Some(date), _) => NaiveDate::parse_from_str(date, DATE_FORMAT)
                        .map_err(|e| anyhow::anyhow!("invalid date {:?}: {}", date, e))?,
                    (None, Some(days)) => today
                        .checked_add_days(chrono::Days::new(days))
                        .ok_or_else(|| {
                            anyhow::anyhow!("{} days from today is out of range", days)
                        })?,
                    (None, None) => anyhow::bail!("either --days or --date is required"),
                };
                Ok(PendingChange::Postpone {
                    task_id: checked_id(&args.task_id)?,
                    new_date: new_date.format(DATE_FORMAT).to_string(),
                })
            }
            QueueCommand::Add { text } => {
                let text = text.join(" ");
                if text.trim().is_empty() {
                    anyhow::bail!("task text is empty");
                }
                Ok(PendingChange::NewTask {
                    text: text.trim().to_string(),
                })
            }
        }
    }
}

fn checked_id(raw: &str) -> anyhow::Result<TaskId> {
    let id = TaskId::from(raw);
    id.resolve()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
    }

    #[test]
    fn test_postpone_by_days_crosses_month() {
        let cmd = QueueCommand::Postpone(PostponeArgs {
            task_id: "notes.md:3".into(),
            days: Some(7),
            date: None,
        });
        assert_eq!(
            cmd.to_change(today()).unwrap(),
            PendingChange::Postpone {
                task_id: TaskId::from("notes.md:3"),
                new_date: "2024-02-06".into(),
            }
        );
    }

    #[test]
    fn test_postpone_explicit_date_is_validated() {
        let cmd = QueueCommand::Postpone(PostponeArgs {
            task_id: "notes.md:3".into(),
            days: None,
            date: Some("2024-13-01".into()),
        });
        assert!(cmd.to_change(today()).is_err());
    }

    #[test]
    fn test_add_joins_words() {
        let cmd = QueueCommand::Add {
            text: vec!["call".into(), "mom".into()],
        };
        assert_eq!(
            cmd.to_change(today()).unwrap(),
            PendingChange::NewTask {
                text: "call mom".into()
            }
        );
    }

    #[test]
    fn test_toggle_rejects_bad_id() {
        let cmd = QueueCommand::Toggle {
            task_id: "notes.md".into(),
        };
        assert!(cmd.to_change(today()).is_err());
    }
}
