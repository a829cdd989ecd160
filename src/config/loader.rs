//! Configuration loader with tier-based merging.
//!
//! Tiers, lowest to highest: embedded defaults, project
//! `./task-publish/config.yaml`, user `~/.task-publish/config.yaml`,
//! environment variables. `TASK_PUBLISH_CONFIG_PATH` names a single file that
//! replaces both file tiers.

use super::merge::deep_merge_all;
use super::types::Config;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for configuration.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
    /// Explicit config file replacing the project and user tiers.
    pub explicit_file: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var("TASK_PUBLISH_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-publish")));

        let project_dir = std::env::var("TASK_PUBLISH_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-publish")));

        let explicit_file = std::env::var("TASK_PUBLISH_CONFIG_PATH")
            .ok()
            .map(PathBuf::from);

        Self {
            project_dir,
            user_dir,
            explicit_file,
        }
    }

    /// Paths with explicit directories and no environment lookups.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
            explicit_file: None,
        }
    }

    /// Directory whose files should be watched for live reload.
    pub fn watch_dir(&self) -> Option<&Path> {
        match self.explicit_file {
            Some(ref file) => file.parent(),
            None => self.project_dir.as_deref(),
        }
    }
}

/// Reads every tier and produces one merged [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Highest-priority file that contributed, if any.
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut tiers: Vec<Value> = Vec::new();
        let mut config_path = None;

        tiers.push(serde_json::to_value(Config::default()).map_err(Error::internal)?);

        if let Some(ref explicit) = paths.explicit_file {
            tiers.push(read_yaml(explicit)?);
            config_path = Some(explicit.clone());
        } else {
            for (tier, dir) in [
                (ConfigTier::Project, &paths.project_dir),
                (ConfigTier::User, &paths.user_dir),
            ] {
                let Some(dir) = dir else { continue };
                let file = dir.join("config.yaml");
                if !file.exists() {
                    continue;
                }
                match read_yaml(&file) {
                    Ok(value) => {
                        debug!(tier = %tier, path = %file.display(), "Loaded config tier");
                        tiers.push(value);
                        config_path = Some(file);
                    }
                    Err(e) => warn!(tier = %tier, "Ignoring unreadable config: {}", e),
                }
            }
        }

        let merged = deep_merge_all(tiers);
        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(root) = std::env::var("TASK_PUBLISH_VAULT_DIR") {
            config.vault.root = PathBuf::from(root);
        }

        if let Ok(path) = std::env::var("TASK_PUBLISH_CHANGELOG_PATH") {
            config.sync.changelog_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("TASK_PUBLISH_STATE_PATH") {
            config.sync.state_path = PathBuf::from(path);
        }

        if let Ok(secret) = std::env::var("TASK_PUBLISH_PAGE_SECRET") {
            config.publish.page_secret = secret;
        }

        if let Ok(interval) = std::env::var("TASK_PUBLISH_SYNC_INTERVAL") {
            match interval.parse() {
                Ok(minutes) => config.sync.interval_minutes = minutes,
                Err(_) => warn!("Ignoring non-numeric TASK_PUBLISH_SYNC_INTERVAL: {}", interval),
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    serde_yaml::from_str::<Value>(&content)
        .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
}
