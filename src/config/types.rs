//! Configuration types.
//!
//! A [`Config`] is an immutable snapshot: components receive it per operation
//! and a changed file on disk produces a new snapshot rather than mutating
//! the old one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default port for the HTTP intake server.
pub const DEFAULT_INTAKE_PORT: u16 = 31995;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub intake: IntakeConfig,
}

/// Where the documents live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root directory of the markdown vault.
    #[serde(default = "default_vault_root")]
    pub root: PathBuf,

    /// Vault-relative path of the page containing `tasks` query blocks.
    #[serde(default = "default_publish_page_path")]
    pub publish_page_path: String,

    /// Vault-relative folder where new tasks land, one document per day.
    #[serde(default = "default_intake_folder")]
    pub intake_folder: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_vault_root(),
            publish_page_path: default_publish_page_path(),
            intake_folder: default_intake_folder(),
        }
    }
}

fn default_vault_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_publish_page_path() -> String {
    "Daily Tasks.md".to_string()
}

fn default_intake_folder() -> String {
    "Daily Notes".to_string()
}

/// Inbound synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minutes between periodic syncs; 0 disables the timer.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Delay before the startup sync, in milliseconds.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Path of the pending-changes document.
    #[serde(default = "default_changelog_path")]
    pub changelog_path: PathBuf,

    /// Path of the persisted sync state (watermark).
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            startup_delay_ms: default_startup_delay_ms(),
            changelog_path: default_changelog_path(),
            state_path: default_state_path(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_startup_delay_ms() -> u64 {
    2_000
}

fn default_changelog_path() -> PathBuf {
    PathBuf::from(".task-publish/pending-changes.json")
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".task-publish/state.json")
}

/// Outbound publishing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Secret the page asks for before showing tasks; empty disables the gate.
    #[serde(default)]
    pub page_secret: String,

    /// Publish destination, handed to the publisher as-is.
    #[serde(default = "default_target")]
    pub target: String,

    /// Page title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Initial retry delay in milliseconds after a failed push (default: 2000).
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Jitter range in milliseconds for retry delay (default: 500, meaning ±0.5s).
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Maximum retry interval in milliseconds (default: 60000).
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Exponential backoff multiplier (default: 2.0).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Total push attempts before giving up (default: 3).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            page_secret: String::new(),
            target: default_target(),
            title: default_title(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

fn default_target() -> String {
    ".task-publish/site".to_string()
}

fn default_title() -> String {
    "My Tasks".to_string()
}

fn default_retry_initial_ms() -> u64 {
    2_000
}

fn default_retry_jitter_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_attempts() -> u32 {
    3
}

/// HTTP intake server for remote edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_intake_port")]
    pub port: u16,

    /// Interface to listen on (default: loopback). Set `0.0.0.0` to accept
    /// edits from other machines.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Public base URL embedded in the page; defaults to the local address.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_intake_port(),
            bind_address: default_bind_address(),
            public_url: None,
        }
    }
}

fn default_intake_port() -> u16 {
    DEFAULT_INTAKE_PORT
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl IntakeConfig {
    /// Address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.trim().parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "intake.bind_address is not an IP address: {}",
                self.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// URL the published page posts edits to, if intake is enabled.
    pub fn page_url(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        Some(
            self.public_url
                .clone()
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port)),
        )
    }
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.vault.intake_folder.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "vault.intake_folder must not be empty".to_string(),
            ));
        }
        if self.vault.publish_page_path.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "vault.publish_page_path must not be empty".to_string(),
            ));
        }
        if !(self.publish.retry_multiplier >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "publish.retry_multiplier must be >= 1.0, got {}",
                self.publish.retry_multiplier
            )));
        }
        if self.intake.enabled && self.intake.port == 0 {
            return Err(Error::InvalidConfig(
                "intake.port must be non-zero when intake is enabled".to_string(),
            ));
        }
        if self.intake.enabled {
            self.intake.socket_addr()?;
        }
        Ok(())
    }

    /// Resolve a path from the config against the vault root when relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.vault.root.join(path)
        }
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.resolve(&self.sync.changelog_path)
    }

    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.sync.state_path)
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.resolve(Path::new(&self.publish.target))
    }
}
