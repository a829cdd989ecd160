//! Queue of edits made on the published page, waiting to be applied.
//!
//! The log is one JSON document:
//!
//! ```json
//! { "toggles":   { "notes.md:3": true },
//!   "postpones": { "notes.md:5": "2024-01-08" },
//!   "newTasks":  { "1704099600000": "call the plumber" } }
//! ```
//!
//! Producers append with [`FileChangeLog::append`]. The consumer claims the
//! whole document by renaming it to a `.processing` sibling, so producers
//! that arrive during a sync start a fresh log instead of racing it. The
//! claimed copy is checkpointed after each applied entry and deleted once
//! the pass completes. A claimed file left behind by a crash or a failed
//! pass is resumed by the next claim, with anything queued since folded
//! into it, which makes delivery at-least-once.
//!
//! A claimed document that does not parse is moved aside to a
//! `.rejected-<ms>` sibling so it can be inspected without blocking later
//! passes.

use crate::error::{Error, Result};
use crate::types::PendingChange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Pending changes grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChanges {
    /// Task ids to flip. The value is always `true`; repeated toggles of the
    /// same task before a sync collapse into one.
    #[serde(default)]
    pub toggles: BTreeMap<String, bool>,

    /// Task id to new due date.
    #[serde(default)]
    pub postpones: BTreeMap<String, String>,

    /// Arrival key to task text. Keys sort lexically, so millisecond
    /// timestamps give arrival order.
    #[serde(default, rename = "newTasks")]
    pub new_tasks: BTreeMap<String, String>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty() && self.postpones.is_empty() && self.new_tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.toggles.len() + self.postpones.len() + self.new_tasks.len()
    }

    /// Record one change. `key` orders new tasks and is ignored otherwise.
    pub fn push(&mut self, change: PendingChange, key: &str) {
        match change {
            PendingChange::Toggle { task_id } => {
                self.toggles.insert(task_id.to_string(), true);
            }
            PendingChange::Postpone { task_id, new_date } => {
                self.postpones.insert(task_id.to_string(), new_date);
            }
            PendingChange::NewTask { text } => {
                let mut key = key.to_string();
                while self.new_tasks.contains_key(&key) {
                    key.push('_');
                }
                self.new_tasks.insert(key, text);
            }
        }
    }

    /// Fold in changes queued after this batch was claimed.
    ///
    /// Folding the same log twice leaves the batch unchanged.
    pub fn merge(&mut self, newer: PendingChanges) {
        self.toggles.extend(newer.toggles);
        self.postpones.extend(newer.postpones);
        for (key, text) in newer.new_tasks {
            let mut slot = key;
            loop {
                match self.new_tasks.get(&slot) {
                    None => {
                        self.new_tasks.insert(slot, text);
                        break;
                    }
                    Some(existing) if *existing == text => break,
                    Some(_) => slot.push('_'),
                }
            }
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|source| Error::InvalidChangeLog {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Changes taken off the log by a consumer.
#[derive(Debug)]
pub struct ClaimedBatch {
    path: PathBuf,
    pub changes: PendingChanges,
}

impl ClaimedBatch {
    /// Where the claimed document lives until [`FileChangeLog::complete`].
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Change log persisted as a JSON file.
#[derive(Debug)]
pub struct FileChangeLog {
    path: PathBuf,
    /// Serializes appends and claims within this process.
    lock: Mutex<()>,
}

impl FileChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn processing_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".processing");
        self.path.with_file_name(name)
    }

    /// Append one change, keyed by `key` for new tasks.
    pub async fn append(&self, change: PendingChange, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut changes = match read_optional(&self.path).await? {
            Some(content) => PendingChanges::parse(&self.path, &content)?,
            None => PendingChanges::default(),
        };
        debug!(kind = change.kind(), "Queueing change");
        changes.push(change, key);
        write_json_atomic(&self.path, &changes).await
    }

    /// Changes queued in the live log, without claiming them.
    pub async fn pending(&self) -> Result<PendingChanges> {
        match read_optional(&self.path).await? {
            Some(content) => PendingChanges::parse(&self.path, &content),
            None => Ok(PendingChanges::default()),
        }
    }

    /// Take ownership of the queued changes.
    ///
    /// A batch left by an interrupted or failed pass is resumed, with the
    /// live log folded into it. Returns `None` when there is nothing to
    /// process.
    pub async fn claim(&self) -> Result<Option<ClaimedBatch>> {
        let _guard = self.lock.lock().await;
        let processing = self.processing_path();

        let Some(content) = read_optional(&processing).await? else {
            return self.claim_live(processing).await;
        };
        let mut changes = match PendingChanges::parse(&processing, &content) {
            Ok(changes) => changes,
            Err(e) => {
                quarantine(&processing).await?;
                return Err(e);
            }
        };
        info!(path = %processing.display(), "Resuming interrupted change batch");

        if let Some(content) = read_optional(&self.path).await? {
            match PendingChanges::parse(&self.path, &content) {
                Ok(live) => changes.merge(live),
                Err(e) => {
                    quarantine(&self.path).await?;
                    return Err(e);
                }
            }
            write_json_atomic(&processing, &changes).await?;
            remove_optional(&self.path).await?;
        }

        Ok(Some(ClaimedBatch {
            path: processing,
            changes,
        }))
    }

    async fn claim_live(&self, processing: PathBuf) -> Result<Option<ClaimedBatch>> {
        match tokio::fs::rename(&self.path, &processing).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::io(
                    format!("claiming {}", self.path.display()),
                    e,
                ));
            }
        }

        let content = read_optional(&processing).await?.unwrap_or_default();
        match PendingChanges::parse(&processing, &content) {
            Ok(changes) => Ok(Some(ClaimedBatch {
                path: processing,
                changes,
            })),
            Err(e) => {
                quarantine(&processing).await?;
                Err(e)
            }
        }
    }

    /// Persist the batch's remaining changes so a crash replays only those.
    pub async fn checkpoint(&self, batch: &ClaimedBatch) -> Result<()> {
        write_json_atomic(&batch.path, &batch.changes).await
    }

    /// Drop a fully processed batch.
    pub async fn complete(&self, batch: ClaimedBatch) -> Result<()> {
        remove_optional(&batch.path).await
    }
}

/// Move an unparseable log out of the way, keeping it for inspection.
async fn quarantine(path: &Path) -> Result<PathBuf> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".rejected-{}", chrono::Utc::now().timestamp_millis()));
    let rejected = path.with_file_name(name);
    tokio::fs::rename(path, &rejected)
        .await
        .map_err(|e| Error::io(format!("setting aside {}", path.display()), e))?;
    warn!(path = %rejected.display(), "Set aside unreadable change log");
    Ok(rejected)
}

async fn remove_optional(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(format!("removing {}", path.display()), e)),
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(format!("reading {}", path.display()), e)),
    }
}

/// Serialize `value` to `path` through a temporary sibling and a rename.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(Error::internal)?;
    write_atomic(path, json.as_bytes()).await
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| Error::io(format!("writing {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::io(format!("replacing {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;
    use tempfile::TempDir;

    fn toggle(id: &str) -> PendingChange {
        PendingChange::Toggle {
            task_id: TaskId::from(id),
        }
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let changes: PendingChanges =
            serde_json::from_str(r#"{"toggles":{"a.md:1":true}}"#).unwrap();
        assert_eq!(changes.toggles.len(), 1);
        assert!(changes.postpones.is_empty());
        assert!(changes.new_tasks.is_empty());
    }

    #[test]
    fn test_new_tasks_serialize_camel_case() {
        let mut changes = PendingChanges::default();
        changes.push(
            PendingChange::NewTask {
                text: "buy milk".into(),
            },
            "1704099600000",
        );
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json["newTasks"]["1704099600000"], "buy milk");
    }

    #[test]
    fn test_duplicate_new_task_keys_are_kept() {
        let mut changes = PendingChanges::default();
        changes.push(PendingChange::NewTask { text: "a".into() }, "100");
        changes.push(PendingChange::NewTask { text: "b".into() }, "100");
        let texts: Vec<&String> = changes.new_tasks.values().collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_append_then_claim_and_complete() {
        let temp = TempDir::new().unwrap();
        let log = FileChangeLog::new(temp.path().join("state/pending.json"));

        log.append(toggle("notes.md:3"), "1").await.unwrap();
        log.append(toggle("notes.md:3"), "2").await.unwrap();
        log.append(
            PendingChange::Postpone {
                task_id: TaskId::from("notes.md:4"),
                new_date: "2024-01-08".into(),
            },
            "3",
        )
        .await
        .unwrap();
        assert_eq!(log.pending().await.unwrap().len(), 2);

        let batch = log.claim().await.unwrap().unwrap();
        assert_eq!(batch.changes.toggles.len(), 1);
        assert!(!log.path().exists());

        // Appends during a pass go to a fresh log.
        log.append(toggle("other.md:0"), "4").await.unwrap();
        assert_eq!(log.pending().await.unwrap().toggles.len(), 1);

        let claimed_path = batch.path().to_path_buf();
        log.complete(batch).await.unwrap();
        assert!(!claimed_path.exists());
    }

    #[tokio::test]
    async fn test_missing_log_claims_nothing() {
        let temp = TempDir::new().unwrap();
        let log = FileChangeLog::new(temp.path().join("pending.json"));
        assert!(log.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interrupted_batch_resumes_from_checkpoint() {
        let temp = TempDir::new().unwrap();
        let log = FileChangeLog::new(temp.path().join("pending.json"));
        log.append(toggle("a.md:0"), "1").await.unwrap();
        log.append(PendingChange::NewTask { text: "x".into() }, "2").await.unwrap();

        let mut batch = log.claim().await.unwrap().unwrap();
        batch.changes.toggles.clear();
        log.checkpoint(&batch).await.unwrap();
        drop(batch);

        let resumed = log.claim().await.unwrap().unwrap();
        assert!(resumed.changes.toggles.is_empty());
        assert_eq!(resumed.changes.new_tasks.len(), 1);
    }

    fn rejected_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".rejected-"))
            .collect()
    }

    #[tokio::test]
    async fn test_malformed_log_is_set_aside() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pending.json");
        std::fs::write(&path, "{ not json").unwrap();
        let log = FileChangeLog::new(&path);

        let err = log.claim().await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidChangeLog);
        assert!(!temp.path().join("pending.json.processing").exists());
        assert_eq!(rejected_files(temp.path()).len(), 1);

        // Producers and the next claim carry on with a fresh log
        log.append(toggle("a.md:0"), "1").await.unwrap();
        let batch = log.claim().await.unwrap().unwrap();
        assert_eq!(batch.changes.toggles.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_resumed_batch_is_set_aside() {
        let temp = TempDir::new().unwrap();
        let log = FileChangeLog::new(temp.path().join("pending.json"));
        std::fs::write(temp.path().join("pending.json.processing"), "[1,").unwrap();
        log.append(toggle("a.md:0"), "1").await.unwrap();

        assert!(log.claim().await.is_err());
        assert_eq!(rejected_files(temp.path()).len(), 1);

        let batch = log.claim().await.unwrap().unwrap();
        assert_eq!(batch.changes.toggles.len(), 1);
    }

    #[tokio::test]
    async fn test_resumed_batch_absorbs_the_live_log() {
        let temp = TempDir::new().unwrap();
        let log = FileChangeLog::new(temp.path().join("pending.json"));
        log.append(PendingChange::NewTask { text: "x".into() }, "1").await.unwrap();
        let batch = log.claim().await.unwrap().unwrap();
        drop(batch);

        log.append(toggle("a.md:0"), "2").await.unwrap();
        log.append(PendingChange::NewTask { text: "y".into() }, "3").await.unwrap();

        let resumed = log.claim().await.unwrap().unwrap();
        assert_eq!(resumed.changes.toggles.len(), 1);
        let texts: Vec<&String> = resumed.changes.new_tasks.values().collect();
        assert_eq!(texts, vec!["x", "y"]);
        assert!(!log.path().exists());

        // The merged batch is what a further restart sees
        drop(resumed);
        let again = log.claim().await.unwrap().unwrap();
        assert_eq!(again.changes.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut batch = PendingChanges::default();
        batch.push(PendingChange::NewTask { text: "a".into() }, "1");
        let mut live = PendingChanges::default();
        live.push(PendingChange::NewTask { text: "b".into() }, "1");
        live.push(toggle("a.md:0"), "");

        batch.merge(live.clone());
        batch.merge(live);
        assert_eq!(batch.toggles.len(), 1);
        let texts: Vec<&String> = batch.new_tasks.values().collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
