//! Outbound publishing of the rendered page.

use crate::changelog::write_atomic;
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, compute_jittered_delay};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Destination for a rendered page.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Make `content` the published page.
    async fn push(&self, content: &str) -> Result<()>;

    /// Human-readable destination, shown on the page.
    fn target(&self) -> String;
}

/// Writes `index.html` into a directory, e.g. a checkout served by a static host.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    pub const INDEX_FILE: &'static str = "index.html";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(Self::INDEX_FILE)
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn push(&self, content: &str) -> Result<()> {
        let index = self.index_path();
        if let Ok(existing) = tokio::fs::read_to_string(&index).await
            && existing == content
        {
            debug!(path = %index.display(), "Published page unchanged");
            return Ok(());
        }
        write_atomic(&index, content.as_bytes())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        info!(path = %index.display(), bytes = content.len(), "Published page");
        Ok(())
    }

    fn target(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Retries a failing publisher with exponential backoff and jitter.
pub struct RetryingPublisher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Publisher> RetryingPublisher<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Publisher> Publisher for RetryingPublisher<P> {
    async fn push(&self, content: &str) -> Result<()> {
        let mut delay_ms = self.policy.initial_ms;
        let mut attempt = 1;
        loop {
            match self.inner.push(content).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.policy.attempts => {
                    return Err(match e {
                        Error::Transport(_) => e,
                        other => Error::Transport(other.to_string()),
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        "Publish to {} failed: {}. Retrying in {:.1}s...",
                        self.inner.target(),
                        e,
                        delay_ms as f64 / 1000.0
                    );
                    tokio::time::sleep(compute_jittered_delay(delay_ms, self.policy.jitter_ms))
                        .await;
                    delay_ms = self.policy.backoff(delay_ms);
                    attempt += 1;
                }
            }
        }
    }

    fn target(&self) -> String {
        self.inner.target()
    }
}
