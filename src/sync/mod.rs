//! Applying queued page edits back to the vault.
//!
//! One pass runs `claim log → toggles → postpones → new tasks → clear log →
//! advance watermark`. Every entry leaves the claimed log as soon as it has
//! been attempted, so an interrupted pass replays at most the entry in
//! flight. Toggle and postpone entries are independent: one that cannot be
//! applied is logged and counted, and the rest still run. New tasks share a
//! destination document, so failing to find one fails the pass and leaves
//! the unapplied tasks and the watermark where they were.

pub mod edit;
mod watermark;

pub use watermark::{SyncState, WatermarkStore};

use crate::changelog::{ClaimedBatch, FileChangeLog};
use crate::error::{Error, Result};
use crate::extract::contains_tasks;
use crate::query::DATE_FORMAT;
use crate::store::{DocumentStore, in_folder};
use crate::types::TaskId;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome counts for one category of changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub applied: usize,
    /// Entries whose target was missing or no longer a task.
    pub skipped: usize,
    /// Entries that hit an underlying storage error.
    pub failed: usize,
}

impl CategoryReport {
    fn record(&mut self, outcome: &Result<()>) {
        match outcome {
            Ok(()) => self.applied += 1,
            Err(e) if e.is_skippable() => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub toggles: CategoryReport,
    pub postpones: CategoryReport,
    pub new_tasks: CategoryReport,
    /// Document new tasks were written to, if there were any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intake_document: Option<String>,
    /// Watermark stored at the end of the pass.
    pub watermark: i64,
}

impl SyncReport {
    pub fn total_applied(&self) -> usize {
        self.toggles.applied + self.postpones.applied + self.new_tasks.applied
    }
}

/// Where new tasks go and what a fresh daily document looks like.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub folder: String,
    /// Initial text of a created daily document; `{date}` is substituted.
    pub daily_template: String,
}

/// Consumer of the change log.
pub struct Synchronizer {
    store: Arc<dyn DocumentStore>,
    changelog: Arc<FileChangeLog>,
    watermark: WatermarkStore,
    intake: IntakeSettings,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        changelog: Arc<FileChangeLog>,
        watermark: WatermarkStore,
        intake: IntakeSettings,
    ) -> Self {
        Self {
            store,
            changelog,
            watermark,
            intake,
        }
    }

    /// Run one pass. `today` names the intake document; `now_ms` becomes the
    /// new watermark.
    pub async fn sync(&self, today: NaiveDate, now_ms: i64) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        if let Some(mut batch) = self.changelog.claim().await? {
            self.apply_batch(&mut batch, today, &mut report).await?;
            self.changelog.complete(batch).await?;
        }

        self.watermark.advance(now_ms).await?;
        report.watermark = now_ms;

        info!(
            applied = report.total_applied(),
            skipped = report.toggles.skipped + report.postpones.skipped,
            failed = report.toggles.failed + report.postpones.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Sync pass complete"
        );
        Ok(report)
    }

    /// Apply every entry of `batch`, dropping each from the claimed file as
    /// soon as it has been attempted.
    async fn apply_batch(
        &self,
        batch: &mut ClaimedBatch,
        today: NaiveDate,
        report: &mut SyncReport,
    ) -> Result<()> {
        let toggles: Vec<String> = batch.changes.toggles.keys().cloned().collect();
        for task_id in toggles {
            let outcome = self.toggle(&TaskId::from(task_id.as_str())).await;
            log_entry("toggle", &task_id, &outcome);
            report.toggles.record(&outcome);
            batch.changes.toggles.remove(&task_id);
            self.changelog.checkpoint(batch).await?;
        }

        let postpones: Vec<(String, String)> = batch
            .changes
            .postpones
            .iter()
            .map(|(id, date)| (id.clone(), date.clone()))
            .collect();
        for (task_id, new_date) in postpones {
            let outcome = self
                .postpone(&TaskId::from(task_id.as_str()), &new_date)
                .await;
            log_entry("postpone", &task_id, &outcome);
            report.postpones.record(&outcome);
            batch.changes.postpones.remove(&task_id);
            self.changelog.checkpoint(batch).await?;
        }

        if batch.changes.new_tasks.is_empty() {
            return Ok(());
        }
        let destination = self.resolve_intake_document(today).await?;
        let new_tasks: Vec<(String, String)> = batch
            .changes
            .new_tasks
            .iter()
            .map(|(key, text)| (key.clone(), text.clone()))
            .collect();
        for (key, text) in new_tasks {
            self.insert_task(&destination, &text).await?;
            report.new_tasks.applied += 1;
            batch.changes.new_tasks.remove(&key);
            self.changelog.checkpoint(batch).await?;
        }
        report.intake_document = Some(destination);
        Ok(())
    }

    /// Flip the checkbox the id points at.
    pub async fn toggle(&self, task_id: &TaskId) -> Result<()> {
        let (path, line) = task_id.resolve()?;
        let content = self.store.read(path).await?;
        let updated = edit::toggle_line(&content, line).ok_or_else(|| Error::MalformedLine {
            path: path.to_string(),
            line,
        })?;
        self.store.write(path, &updated).await
    }

    /// Set the due date of the line the id points at.
    pub async fn postpone(&self, task_id: &TaskId, new_date: &str) -> Result<()> {
        let (path, line) = task_id.resolve()?;
        let content = self.store.read(path).await?;
        let updated =
            edit::postpone_line(&content, line, new_date).ok_or_else(|| Error::MalformedLine {
                path: path.to_string(),
                line,
            })?;
        self.store.write(path, &updated).await
    }

    /// Insert tasks, in order, into the intake document for `today`.
    ///
    /// Each insertion goes directly under the tasks heading, so later tasks
    /// end up above earlier ones.
    pub async fn add_tasks(&self, texts: &[&str], today: NaiveDate) -> Result<String> {
        let destination = self.resolve_intake_document(today).await?;
        for text in texts {
            self.insert_task(&destination, text).await?;
        }
        Ok(destination)
    }

    async fn insert_task(&self, destination: &str, text: &str) -> Result<()> {
        let content = self.store.read(destination).await?;
        self.store
            .write(destination, &edit::insert_task(&content, text))
            .await?;
        info!(path = %destination, "Added task: {}", text);
        Ok(())
    }

    /// Today's intake document, created from the template when missing.
    ///
    /// If creation fails, falls back to the most recently modified document
    /// in the intake folder.
    pub async fn resolve_intake_document(&self, today: NaiveDate) -> Result<String> {
        let folder = self.intake.folder.trim_end_matches('/');
        let date = today.format(DATE_FORMAT).to_string();
        let path = format!("{}/{}.md", folder, date);

        if self.store.exists(&path).await {
            return Ok(path);
        }

        let initial = self.intake.daily_template.replace("{date}", &date);
        let create_err = match self.store.create(&path, &initial).await {
            Ok(handle) => {
                info!(path = %handle.path, "Created intake document");
                return Ok(handle.path);
            }
            Err(e) => e,
        };
        warn!(path = %path, "Could not create intake document: {}", create_err);

        let mut newest: Option<(i64, String)> = None;
        for candidate in self.store.list_documents().await? {
            if !in_folder(&candidate, folder) {
                continue;
            }
            let modified = self.store.modified_time(&candidate).await?;
            if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
                newest = Some((modified, candidate));
            }
        }

        match newest {
            Some((_, fallback)) => {
                info!(path = %fallback, "Using most recent intake document instead");
                Ok(fallback)
            }
            None => Err(Error::ResolutionExhausted(format!(
                "{} could not be created ({}) and {} holds no documents",
                path, create_err, folder
            ))),
        }
    }

    /// Documents changed after `watermark` that contain at least one task.
    pub async fn modified_since(&self, watermark: i64) -> Result<Vec<String>> {
        let mut modified = Vec::new();
        for path in self.store.list_documents().await? {
            if self.store.modified_time(&path).await? <= watermark {
                continue;
            }
            if contains_tasks(&self.store.read(&path).await?) {
                modified.push(path);
            }
        }
        Ok(modified)
    }

    /// Watermark of the last completed pass.
    pub async fn last_sync(&self) -> Result<i64> {
        Ok(self.watermark.load().await?.last_sync)
    }
}

fn log_entry(kind: &str, task_id: &str, outcome: &Result<()>) {
    match outcome {
        Ok(()) => info!(task_id, kind, "Applied change"),
        Err(e) => warn!(task_id, kind, code = ?e.code(), "Skipped change: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn synchronizer(store: Arc<MemoryDocumentStore>, temp: &TempDir) -> Synchronizer {
        Synchronizer::new(
            store,
            Arc::new(FileChangeLog::new(temp.path().join("pending.json"))),
            WatermarkStore::new(temp.path().join("state.json")),
            IntakeSettings {
                folder: "Daily Notes".to_string(),
                daily_template: "# {date}\n\n## Tasks\n".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_toggle_errors_are_classified() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new().with_document("a.md", "text\n- [ ] x"));
        let sync = synchronizer(store.clone(), &temp);

        assert_eq!(
            sync.toggle(&"missing.md:0".into()).await.unwrap_err().code(),
            crate::error::ErrorCode::NotFound
        );
        assert_eq!(
            sync.toggle(&"a.md:0".into()).await.unwrap_err().code(),
            crate::error::ErrorCode::MalformedLine
        );
        assert_eq!(
            sync.toggle(&"a.md".into()).await.unwrap_err().code(),
            crate::error::ErrorCode::InvalidTaskId
        );
        sync.toggle(&"a.md:1".into()).await.unwrap();
        assert_eq!(store.get("a.md").unwrap(), "text\n- [x] x");
    }

    #[tokio::test]
    async fn test_intake_document_created_from_template() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = synchronizer(store.clone(), &temp);

        let path = sync.add_tasks(&["first", "second"], today()).await.unwrap();
        assert_eq!(path, "Daily Notes/2024-01-01.md");
        assert_eq!(
            store.get(&path).unwrap(),
            "# 2024-01-01\n\n## Tasks\n- [ ] second\n- [ ] first\n"
        );
    }

    #[tokio::test]
    async fn test_intake_falls_back_to_newest_document() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document("Daily Notes/2023-12-30.md", "old")
                .with_document("Daily Notes/2023-12-31.md", "newer")
                .with_document("Elsewhere/2024-01-05.md", "not intake"),
        );
        store.set_modified("Daily Notes/2023-12-30.md", 10);
        store.set_modified("Daily Notes/2023-12-31.md", 20);
        store.set_modified("Elsewhere/2024-01-05.md", 99);
        store.refuse_create(true);

        let sync = synchronizer(store, &temp);
        assert_eq!(
            sync.resolve_intake_document(today()).await.unwrap(),
            "Daily Notes/2023-12-31.md"
        );
    }

    #[tokio::test]
    async fn test_modified_since_filters_by_time_and_tasks() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document("old.md", "- [ ] old")
                .with_document("new.md", "- [ ] new")
                .with_document("prose.md", "no tasks"),
        );
        store.set_modified("old.md", 5);
        store.set_modified("new.md", 50);
        store.set_modified("prose.md", 50);

        let sync = synchronizer(store, &temp);
        assert_eq!(sync.modified_since(10).await.unwrap(), vec!["new.md"]);
        assert_eq!(sync.modified_since(0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_pass_still_advances_watermark() {
        let temp = TempDir::new().unwrap();
        let sync = synchronizer(Arc::new(MemoryDocumentStore::new()), &temp);
        let report = sync.sync(today(), 1234).await.unwrap();
        assert_eq!(report.total_applied(), 0);
        assert_eq!(sync.last_sync().await.unwrap(), 1234);
    }
}
