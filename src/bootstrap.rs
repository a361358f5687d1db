//! Collaborator construction at startup
//!
//! Opens the sled database once and hands out the post store and job cache
//! built on its trees. Opening is retried with exponential backoff; after
//! startup nothing is retried.

use anyhow::{Context, Result};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::{clear_unfinished, SledJobCache};
use crate::config::StorageConfig;
use crate::retrieval::SledPostStore;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&StorageConfig> for RetryPolicy {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            attempts: storage.connect_attempts.max(1),
            initial_delay: storage.initial_backoff(),
            max_delay: storage.max_backoff(),
        }
    }
}

/// Run `open` until it succeeds or the attempts are used up.
pub async fn open_with_retry<T, E, F>(name: &str, policy: &RetryPolicy, mut open: F) -> Result<T>
where
    E: Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match open() {
            Ok(value) => {
                if attempt > 1 {
                    info!(collaborator = name, attempt, "Connected after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt == attempts {
                    break;
                }
                let delay = policy.delay(attempt);
                warn!(
                    collaborator = name,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Open failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    error!(collaborator = name, max_attempts = attempts, "All open attempts failed");
    anyhow::bail!("{name} unavailable after {attempts} attempts: {last_error}")
}

/// Storage-backed collaborators sharing one sled database.
pub struct Collaborators {
    pub db: sled::Db,
    pub store: Arc<SledPostStore>,
    pub cache: Arc<SledJobCache>,
}

pub async fn open_collaborators(storage: &StorageConfig) -> Result<Collaborators> {
    let policy = RetryPolicy::from(storage);
    let path = storage.data_dir.clone();

    let db = open_with_retry("sled", &policy, || sled::open(&path))
        .await
        .with_context(|| format!("Failed to open data directory {}", path.display()))?;
    let store = SledPostStore::from_db(&db).context("Failed to open post store")?;
    let cache = SledJobCache::from_db(&db).context("Failed to open job cache")?;
    let cleared = clear_unfinished(&cache)
        .await
        .context("Failed to clear unfinished jobs")?;
    if cleared > 0 {
        warn!(cleared, "Cleared jobs left unfinished by a previous run");
    }

    info!(
        path = %path.display(),
        posts = store.len(),
        cached_jobs = cache.len(),
        "Storage ready"
    );
    Ok(Collaborators {
        db,
        store: Arc::new(store),
        cache: Arc::new(cache),
    })
}
