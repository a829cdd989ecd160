//! Document storage seam.
//!
//! Everything that reads or edits markdown goes through [`DocumentStore`].
//! Paths are vault-relative and `/`-separated regardless of platform.

mod fs;
mod memory;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::error::Result;
use crate::extract::extract;
use crate::types::TaskRecord;
use async_trait::async_trait;
use tracing::warn;

/// A document that was just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub path: String,
}

/// Host-provided access to markdown documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All markdown documents, sorted by path.
    async fn list_documents(&self) -> Result<Vec<String>>;

    /// Full text of a document. `Error::NotFound` when absent.
    async fn read(&self, path: &str) -> Result<String>;

    /// Replace the text of an existing document.
    async fn write(&self, path: &str, text: &str) -> Result<()>;

    /// Create a new document. Fails if it already exists or creation is refused.
    async fn create(&self, path: &str, initial_text: &str) -> Result<DocumentHandle>;

    async fn exists(&self, path: &str) -> bool;

    /// Last modification time in milliseconds since the Unix epoch.
    async fn modified_time(&self, path: &str) -> Result<i64>;
}

/// Extract tasks from every document in the store.
///
/// A document that cannot be read is skipped with a warning.
pub async fn collect_tasks(store: &dyn DocumentStore) -> Result<Vec<TaskRecord>> {
    let mut tasks = Vec::new();
    for path in store.list_documents().await? {
        match store.read(&path).await {
            Ok(text) => tasks.extend(extract(&text, &path)),
            Err(e) => warn!(path = %path, "Skipping unreadable document: {}", e),
        }
    }
    Ok(tasks)
}

/// Whether `path` lies inside `folder` (vault-relative, `/`-separated).
pub fn in_folder(path: &str, folder: &str) -> bool {
    let folder = folder.trim_end_matches('/');
    folder.is_empty()
        || path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}
