//! Persisted sync state.

use crate::changelog::write_json_atomic;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Milliseconds since the Unix epoch of the last completed pass; 0 if none.
    #[serde(default)]
    pub last_sync: i64,
}

/// JSON file holding [`SyncState`].
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. A missing or unreadable file counts as never synced.
    pub async fn load(&self) -> Result<SyncState> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SyncState::default()),
            Err(e) => return Err(Error::io(format!("reading {}", self.path.display()), e)),
        };
        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring corrupt sync state: {}", e);
                Ok(SyncState::default())
            }
        }
    }

    pub async fn advance(&self, last_sync: i64) -> Result<()> {
        write_json_atomic(&self.path, &SyncState { last_sync }).await
    }
}
