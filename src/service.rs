//! The long-lived application service.
//!
//! Owns the document store, the change log and the current configuration
//! snapshot. Publishing and syncing both go through one gate so they never
//! touch the vault at the same time; queueing a change only touches the log
//! and skips the gate.

use crate::changelog::FileChangeLog;
use crate::config::Config;
use crate::error::Result;
use crate::publish::{DirectoryPublisher, Publisher, RetryingPublisher};
use crate::query::Query;
use crate::render::{PageOptions, process_task_queries, render_page};
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, FsDocumentStore, collect_tasks};
use crate::sync::{IntakeSettings, SyncReport, Synchronizer, WatermarkStore};
use crate::types::{PendingChange, TaskRecord};
use arc_swap::ArcSwap;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Local calendar date used for queries and intake documents.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Key for a new task in the change log; zero-padded so keys sort by time.
pub fn arrival_key(ms: i64) -> String {
    format!("{:013}", ms)
}

/// What a publish pass produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub tasks: usize,
    pub bytes: usize,
    pub target: String,
}

pub struct Service {
    config: ArcSwap<Config>,
    daily_template: ArcSwap<String>,
    store: Arc<dyn DocumentStore>,
    changelog: Arc<FileChangeLog>,
    gate: Mutex<()>,
}

impl Service {
    pub fn new(config: Config, daily_template: String, store: Arc<dyn DocumentStore>) -> Self {
        let changelog = Arc::new(FileChangeLog::new(config.changelog_path()));
        Self {
            config: ArcSwap::from_pointee(config),
            daily_template: ArcSwap::from_pointee(daily_template),
            store,
            changelog,
            gate: Mutex::new(()),
        }
    }

    /// Service over the vault directory named in `config`.
    pub fn open(config: Config, daily_template: String) -> Self {
        let store = Arc::new(FsDocumentStore::new(config.vault.root.clone()));
        Self::new(config, daily_template, store)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    pub fn changelog(&self) -> Arc<FileChangeLog> {
        Arc::clone(&self.changelog)
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Swap in a new snapshot. The vault root and change log location are
    /// fixed for the life of the service.
    pub fn reload(&self, config: Config, daily_template: String) {
        let current = self.config();
        if config.vault.root != current.vault.root
            || config.changelog_path() != current.changelog_path()
        {
            warn!("Vault root and change log path changes take effect after restart");
        }
        self.config.store(Arc::new(config));
        self.daily_template.store(Arc::new(daily_template));
        info!("Configuration reloaded");
    }

    fn synchronizer(&self, config: &Config) -> Synchronizer {
        Synchronizer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.changelog),
            WatermarkStore::new(config.state_path()),
            IntakeSettings {
                folder: config.vault.intake_folder.clone(),
                daily_template: self.daily_template.load().to_string(),
            },
        )
    }

    /// Publisher described by the configuration.
    pub fn publisher(config: &Config) -> RetryingPublisher<DirectoryPublisher> {
        RetryingPublisher::new(
            DirectoryPublisher::new(config.publish_dir()),
            RetryPolicy::from_publish(&config.publish),
        )
    }

    /// Every task in the vault.
    pub async fn tasks(&self) -> Result<Vec<TaskRecord>> {
        collect_tasks(self.store.as_ref()).await
    }

    /// Tasks matching `query_text`.
    pub async fn list(&self, query_text: &str, today: NaiveDate) -> Result<Vec<TaskRecord>> {
        Ok(Query::parse(query_text).filter(&self.tasks().await?, today))
    }

    /// Render the publish page and push it to the configured target.
    pub async fn publish(&self) -> Result<PublishReport> {
        let config = self.config();
        self.publish_to(&Self::publisher(&config), today()).await
    }

    pub async fn publish_to(
        &self,
        publisher: &dyn Publisher,
        today: NaiveDate,
    ) -> Result<PublishReport> {
        let _gate = self.gate.lock().await;
        let started = Instant::now();
        let config = self.config();

        let page = self.store.read(&config.vault.publish_page_path).await?;
        let tasks = self.tasks().await?;
        let content = process_task_queries(&page, &tasks, today);
        let target = publisher.target();
        let html = render_page(
            &content,
            &PageOptions {
                title: config.publish.title.clone(),
                secret: config.publish.page_secret.clone(),
                target: target.clone(),
                updated_at: chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
                intake_url: config.intake.page_url(),
            },
        );
        publisher.push(&html).await?;

        info!(
            count = tasks.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Published {}",
            config.vault.publish_page_path
        );
        Ok(PublishReport {
            tasks: tasks.len(),
            bytes: html.len(),
            target,
        })
    }

    /// Apply queued changes to the vault.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.sync_at(today(), now_ms()).await
    }

    pub async fn sync_at(&self, today: NaiveDate, now_ms: i64) -> Result<SyncReport> {
        let _gate = self.gate.lock().await;
        let config = self.config();
        self.synchronizer(&config).sync(today, now_ms).await
    }

    /// Documents with tasks changed since the last completed sync.
    pub async fn modified_since_last_sync(&self) -> Result<Vec<String>> {
        let config = self.config();
        let sync = self.synchronizer(&config);
        let watermark = sync.last_sync().await?;
        sync.modified_since(watermark).await
    }

    /// Queue a change for the next sync.
    pub async fn enqueue(&self, change: PendingChange) -> Result<()> {
        self.changelog.append(change, &arrival_key(now_ms())).await
    }

    /// Startup sync after the configured delay, then periodic syncs.
    ///
    /// Runs until the task is dropped. An interval of 0 leaves only the
    /// startup sync.
    pub async fn run_schedule(self: Arc<Self>) {
        let config = self.config();
        tokio::time::sleep(Duration::from_millis(config.sync.startup_delay_ms)).await;
        self.sync_logged("startup").await;

        let minutes = config.sync.interval_minutes;
        if minutes == 0 {
            info!("Periodic sync disabled");
            return;
        }

        let period = Duration::from_secs(minutes * 60);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Syncing every {} minutes", minutes);
        loop {
            ticker.tick().await;
            self.sync_logged("periodic").await;
        }
    }

    async fn sync_logged(&self, trigger: &str) {
        match self.sync().await {
            Ok(report) => info!(
                trigger,
                applied = report.total_applied(),
                "Sync finished"
            ),
            Err(e) => error!(trigger, code = ?e.code(), "Sync failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_keys_sort_by_time() {
        let early = arrival_key(999_999_999_999);
        let late = arrival_key(1_704_099_600_000);
        assert_eq!(early.len(), 13);
        assert!(early < late);
    }
}
