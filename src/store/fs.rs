//! Vault on the local filesystem.

use super::{DocumentHandle, DocumentStore};
use crate::changelog::write_atomic;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Markdown documents under a root directory.
///
/// Hidden entries (names starting with `.`) are skipped when listing, which
/// keeps tool state such as `.task-publish/` and editor folders out of scans.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path to disk, rejecting anything that escapes the root.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or_io(path: &str, action: &str, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        Error::io(format!("{} {}", action, path), e)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list_documents(&self) -> Result<Vec<String>> {
        let mut documents = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(format!("listing {}", dir.display()), e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::io(format!("listing {}", dir.display()), e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::io(format!("inspecting {}", name), e))?;
                let vault_path = format!("{}{}", prefix, name);
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{}/", vault_path)));
                } else if file_type.is_file() && name.ends_with(".md") {
                    documents.push(vault_path);
                }
            }
        }

        documents.sort();
        Ok(documents)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        fs::read_to_string(&full)
            .await
            .map_err(|e| not_found_or_io(path, "reading", e))
    }

    /// Replaces the file through a temporary sibling and a rename, so a
    /// failed write never leaves a truncated document.
    async fn write(&self, path: &str, text: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let metadata = fs::metadata(&full)
            .await
            .map_err(|e| not_found_or_io(path, "opening", e))?;
        if !metadata.is_file() {
            return Err(Error::NotFound(path.to_string()));
        }
        write_atomic(&full, text.as_bytes()).await
    }

    async fn create(&self, path: &str, initial_text: &str) -> Result<DocumentHandle> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(format!("creating folder for {}", path), e))?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| Error::io(format!("creating {}", path), e))?;
        file.write_all(initial_text.as_bytes())
            .await
            .map_err(|e| Error::io(format!("writing {}", path), e))?;
        file.flush()
            .await
            .map_err(|e| Error::io(format!("writing {}", path), e))?;
        Ok(DocumentHandle {
            path: path.to_string(),
        })
    }

    async fn exists(&self, path: &str) -> bool {
        match self.full_path(path) {
            Ok(full) => fs::metadata(&full).await.is_ok_and(|m| m.is_file()),
            Err(_) => false,
        }
    }

    async fn modified_time(&self, path: &str) -> Result<i64> {
        let full = self.full_path(path)?;
        let metadata = fs::metadata(&full)
            .await
            .map_err(|e| not_found_or_io(path, "inspecting", e))?;
        let modified = metadata
            .modified()
            .map_err(|e| Error::io(format!("inspecting {}", path), e))?;
        Ok(chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_only_visible_markdown() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("Daily Notes")).unwrap();
        std::fs::create_dir_all(root.join(".task-publish")).unwrap();
        std::fs::write(root.join("Daily Tasks.md"), "x").unwrap();
        std::fs::write(root.join("Daily Notes/2024-01-01.md"), "x").unwrap();
        std::fs::write(root.join("Daily Notes/image.png"), "x").unwrap();
        std::fs::write(root.join(".task-publish/state.md"), "x").unwrap();

        let store = FsDocumentStore::new(root);
        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs, vec!["Daily Notes/2024-01-01.md", "Daily Tasks.md"]);
    }

    #[tokio::test]
    async fn test_read_write_create() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path());

        let err = store.read("missing.md").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(
            store.write("missing.md", "x").await.unwrap_err(),
            Error::NotFound(_)
        ));

        let handle = store.create("notes/new.md", "- [ ] a").await.unwrap();
        assert_eq!(handle.path, "notes/new.md");
        assert!(store.exists("notes/new.md").await);
        assert!(store.create("notes/new.md", "again").await.is_err());

        store.write("notes/new.md", "- [x] a").await.unwrap();
        assert_eq!(store.read("notes/new.md").await.unwrap(), "- [x] a");
        assert!(store.modified_time("notes/new.md").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_write_replaces_the_file_whole() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path());
        store
            .create("notes.md", "- [ ] a long line that will shrink\n- [ ] b\n")
            .await
            .unwrap();

        store.write("notes.md", "- [x] a\n").await.unwrap();
        assert_eq!(store.read("notes.md").await.unwrap(), "- [x] a\n");

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["notes.md"]);

        std::fs::create_dir(temp.path().join("folder.md")).unwrap();
        assert!(matches!(
            store.write("folder.md", "x").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path().join("vault"));
        assert!(matches!(
            store.read("../secret.md").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(!store.exists("/etc/passwd").await);
    }
}
