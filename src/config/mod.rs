//! Layered configuration.
//!
//! Tiers are merged field by field, lowest to highest:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/task-publish/config.yaml`
//! 3. **User** - `~/.task-publish/config.yaml`
//! 4. **Environment** - variables below
//!
//! The daily note template (`daily-template.md`) is resolved first-found-wins
//! from the same directories.
//!
//! ## Environment Variables
//! - `TASK_PUBLISH_CONFIG_PATH` - Explicit config file (replaces project and user tiers)
//! - `TASK_PUBLISH_USER_DIR` - User config dir (default: `~/.task-publish`)
//! - `TASK_PUBLISH_PROJECT_DIR` - Project config dir (default: `./task-publish`)
//! - `TASK_PUBLISH_VAULT_DIR` - Vault root
//! - `TASK_PUBLISH_CHANGELOG_PATH` - Pending-changes document
//! - `TASK_PUBLISH_STATE_PATH` - Sync state file
//! - `TASK_PUBLISH_PAGE_SECRET` - Page access secret
//! - `TASK_PUBLISH_SYNC_INTERVAL` - Minutes between syncs

mod files;
mod loader;
mod merge;
mod types;
pub mod watcher;

pub use files::{DAILY_TEMPLATE_FILE, DEFAULT_DAILY_TEMPLATE, FileSource, ResolvedFile};
pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
