//! File resolution across configuration tiers.
//!
//! Non-YAML files (the daily note template) use first-found-wins resolution
//! from highest tier to lowest, falling back to content embedded in the binary.

use super::loader::ConfigLoader;
use std::path::PathBuf;

/// File name of the daily note template override.
pub const DAILY_TEMPLATE_FILE: &str = "daily-template.md";

/// Template used when creating a missing daily document. `{date}` is replaced
/// with the document's `YYYY-MM-DD` date.
pub const DEFAULT_DAILY_TEMPLATE: &str = "# {date}\n\n## Tasks\n- [ ] Review daily tasks\n\n## Notes\n\n";

/// Source of a resolved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    User,
    Project,
    /// Explicit config file's directory
    Explicit,
    Embedded,
}

impl std::fmt::Display for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSource::User => write!(f, "user"),
            FileSource::Project => write!(f, "project"),
            FileSource::Explicit => write!(f, "explicit"),
            FileSource::Embedded => write!(f, "embedded"),
        }
    }
}

/// A resolved file with its content and metadata.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub content: String,
    /// Where the file was found (None for embedded)
    pub path: Option<PathBuf>,
    pub source: FileSource,
}

impl ResolvedFile {
    pub fn from_disk(content: String, path: PathBuf, source: FileSource) -> Self {
        Self {
            content,
            path: Some(path),
            source,
        }
    }

    pub fn from_embedded(content: &'static str) -> Self {
        Self {
            content: content.to_string(),
            path: None,
            source: FileSource::Embedded,
        }
    }
}

impl ConfigLoader {
    /// Find a file by relative path, searching from highest tier to lowest.
    ///
    /// Returns the first readable file found, or None if no tier has it.
    pub fn find_file(&self, relative_path: &str) -> Option<ResolvedFile> {
        let explicit_dir = self
            .paths
            .explicit_file
            .as_ref()
            .and_then(|f| f.parent())
            .map(|p| p.to_path_buf());

        let tiers = [
            (explicit_dir, FileSource::Explicit),
            (self.paths.user_dir.clone(), FileSource::User),
            (self.paths.project_dir.clone(), FileSource::Project),
        ];

        for (dir, source) in tiers {
            let Some(dir) = dir else { continue };
            let path = dir.join(relative_path);
            if path.exists()
                && let Ok(content) = std::fs::read_to_string(&path)
            {
                return Some(ResolvedFile::from_disk(content, path, source));
            }
        }

        None
    }

    /// The daily note template, from disk if overridden, else embedded.
    pub fn daily_template(&self) -> ResolvedFile {
        self.find_file(DAILY_TEMPLATE_FILE)
            .unwrap_or_else(|| ResolvedFile::from_embedded(DEFAULT_DAILY_TEMPLATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigPaths;
    use tempfile::TempDir;

    #[test]
    fn test_daily_template_embedded_by_default() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(Some(temp.path().join("p")), None);
        let loader = ConfigLoader::load_with_paths(paths).unwrap();

        let template = loader.daily_template();
        assert_eq!(template.source, FileSource::Embedded);
        assert!(template.path.is_none());
        assert!(template.content.contains("## Tasks"));
    }

    #[test]
    fn test_user_template_wins_over_project() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let user = temp.path().join("user");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        std::fs::write(project.join(DAILY_TEMPLATE_FILE), "project {date}").unwrap();
        std::fs::write(user.join(DAILY_TEMPLATE_FILE), "user {date}").unwrap();

        let loader =
            ConfigLoader::load_with_paths(ConfigPaths::with_dirs(Some(project.clone()), Some(user)))
                .unwrap();
        let template = loader.daily_template();
        assert_eq!(template.source, FileSource::User);
        assert_eq!(template.content, "user {date}");

        let loader =
            ConfigLoader::load_with_paths(ConfigPaths::with_dirs(Some(project), None)).unwrap();
        assert_eq!(loader.daily_template().source, FileSource::Project);
    }
}
