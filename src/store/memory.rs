//! In-memory document store for tests and embedders.

use super::{DocumentHandle, DocumentStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Document {
    text: String,
    modified: i64,
}

/// Documents held in a map. Modification times come from a logical clock
/// that ticks on every write unless set explicitly.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, Document>>,
    clock: AtomicI64,
    refuse_create: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_document(self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: &str, text: &str) {
        let modified = self.tick();
        self.documents().insert(
            path.to_string(),
            Document {
                text: text.to_string(),
                modified,
            },
        );
    }

    /// Current text of a document, if present.
    pub fn get(&self, path: &str) -> Option<String> {
        self.documents().get(path).map(|d| d.text.clone())
    }

    /// Make every later `create` call fail.
    pub fn refuse_create(&self, refuse: bool) {
        self.refuse_create.store(refuse, Ordering::SeqCst);
    }

    pub fn set_modified(&self, path: &str, modified: i64) {
        if let Some(doc) = self.documents().get_mut(path) {
            doc.modified = modified;
        }
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn documents(&self) -> MutexGuard<'_, BTreeMap<String, Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self
            .documents()
            .keys()
            .filter(|p| p.ends_with(".md"))
            .cloned()
            .collect())
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, text: &str) -> Result<()> {
        let modified = self.tick();
        match self.documents().get_mut(path) {
            Some(doc) => {
                doc.text = text.to_string();
                doc.modified = modified;
                Ok(())
            }
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    async fn create(&self, path: &str, initial_text: &str) -> Result<DocumentHandle> {
        if self.refuse_create.load(Ordering::SeqCst) {
            return Err(Error::internal(format!("creation refused: {}", path)));
        }
        let modified = self.tick();
        let mut documents = self.documents();
        if documents.contains_key(path) {
            return Err(Error::internal(format!("already exists: {}", path)));
        }
        documents.insert(
            path.to_string(),
            Document {
                text: initial_text.to_string(),
                modified,
            },
        );
        Ok(DocumentHandle {
            path: path.to_string(),
        })
    }

    async fn exists(&self, path: &str) -> bool {
        self.documents().contains_key(path)
    }

    async fn modified_time(&self, path: &str) -> Result<i64> {
        self.documents()
            .get(path)
            .map(|d| d.modified)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }
}
