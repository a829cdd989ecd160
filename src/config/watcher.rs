//! File watcher for configuration files.
//!
//! Watches the project config directory for changes to `config.yaml` and the
//! daily note template. Emits reload events through a tokio watch channel,
//! debounced so an editor's save burst produces one event.

use super::files::DAILY_TEMPLATE_FILE;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when configuration files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// A YAML config file changed
    ConfigYaml(PathBuf),
    /// The daily note template changed
    Template(PathBuf),
    /// Multiple files changed in quick succession
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ConfigChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::ConfigYaml(p) | ConfigChangeEvent::Template(p) => vec![p.as_path()],
            ConfigChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Handle to control the config watcher.
pub struct ConfigWatcherHandle {
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    /// Dropping this stops the watcher.
    _task_handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcherHandle {
    /// Wait for the next config change event. Returns None once the watcher stops.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

/// Starts watching `config_dir` (non-recursively).
pub fn start_config_watcher(
    config_dir: PathBuf,
    config: WatcherConfig,
) -> Result<ConfigWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;

    if config_dir.exists() {
        info!("Watching config directory: {}", config_dir.display());
        debouncer
            .watcher()
            .watch(&config_dir, notify::RecursiveMode::NonRecursive)?;
    } else {
        warn!(
            "Config directory does not exist, skipping watch: {}",
            config_dir.display()
        );
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx);
    });

    Ok(ConfigWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ConfigChangeEvent>>,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events) {
                    debug!("Config change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Config watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(ConfigChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse one debounced batch into at most one event.
fn classify_events(events: Vec<DebouncedEvent>) -> Option<ConfigChangeEvent> {
    let mut changed: Vec<ConfigChangeEvent> = events
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .filter_map(|e| classify_path(&e.path))
        .collect();

    if changed.len() > 1 {
        let paths = changed
            .iter()
            .flat_map(|e| e.affected_paths())
            .map(Path::to_path_buf)
            .collect();
        Some(ConfigChangeEvent::BatchChange(paths))
    } else {
        changed.pop()
    }
}

fn classify_path(path: &Path) -> Option<ConfigChangeEvent> {
    let extension = path.extension().and_then(|e| e.to_str());
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if matches!(extension, Some("yaml") | Some("yml")) {
        return Some(ConfigChangeEvent::ConfigYaml(path.to_path_buf()));
    }
    if file_name == DAILY_TEMPLATE_FILE {
        return Some(ConfigChangeEvent::Template(path.to_path_buf()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_config_yaml() {
        let result = classify_path(&PathBuf::from("task-publish/config.yaml"));
        assert!(matches!(result, Some(ConfigChangeEvent::ConfigYaml(_))));
    }

    #[test]
    fn test_classify_template() {
        let result = classify_path(&PathBuf::from("task-publish/daily-template.md"));
        assert!(matches!(result, Some(ConfigChangeEvent::Template(_))));
    }

    #[test]
    fn test_classify_unknown_file() {
        assert!(classify_path(&PathBuf::from("task-publish/notes.md")).is_none());
        assert!(classify_path(&PathBuf::from("task-publish/config.yaml.swp")).is_none());
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(ConfigChangeEvent::ConfigYaml(PathBuf::new()).requires_reload());
        assert!(ConfigChangeEvent::Template(PathBuf::new()).requires_reload());
        assert!(!ConfigChangeEvent::Error("test".to_string()).requires_reload());
    }
}
