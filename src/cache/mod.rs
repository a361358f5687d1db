//! JobCache trait - fingerprint-keyed job payload store
//!
//! Values are the serialized [`Job`] bytes, returned to pollers verbatim.
//! Backends:
//! - `InMemoryJobCache`: tests and single-process runs, lost on restart
//! - `SledJobCache`: durable, shares the sled database with the post store
//!
//! `claim` is the only conditional write: it creates the entry if the
//! fingerprint is absent and otherwise hands back the existing bytes, so
//! concurrent identical queries compute once.

mod sled_cache;

pub use sled_cache::SledJobCache;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::types::{Fingerprint, Job};

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result of an atomic claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The entry was absent and now holds the caller's bytes
    Claimed,
    /// Another submission owns the fingerprint; its current bytes
    Existing(Vec<u8>),
}

/// Key-value store for job payloads.
#[async_trait]
pub trait JobCache: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError>;

    /// Unconditional write, last write wins.
    async fn set(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError>;

    /// Create the entry only if absent.
    async fn claim(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<ClaimOutcome, CacheError>;

    /// Delete the entry if present.
    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError>;

    /// Every stored entry.
    async fn entries(&self) -> Result<Vec<(Fingerprint, Vec<u8>)>, CacheError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Read and decode a job.
pub async fn load_job(cache: &dyn JobCache, fingerprint: &Fingerprint) -> Result<Option<Job>, CacheError> {
    match cache.get(fingerprint).await? {
        Some(bytes) => Ok(Some(Job::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a job.
pub async fn store_job(cache: &dyn JobCache, fingerprint: &Fingerprint, job: &Job) -> Result<(), CacheError> {
    cache.set(fingerprint, job.to_bytes()?).await
}

/// Remove NEW and IN_PROGRESS entries left behind by a previous process.
///
/// Their work items lived only in that process's queue, so nothing would
/// ever finish them. Entries that do not decode are left alone.
pub async fn clear_unfinished(cache: &dyn JobCache) -> Result<usize, CacheError> {
    let mut cleared = 0;
    for (fingerprint, bytes) in cache.entries().await? {
        let Ok(job) = Job::from_bytes(&bytes) else {
            warn!(fingerprint = %fingerprint, "Skipping undecodable cache entry");
            continue;
        };
        if !job.status.is_terminal() {
            debug!(fingerprint = %fingerprint, status = %job.status, "Clearing unfinished job");
            cache.remove(&fingerprint).await?;
            cleared += 1;
        }
    }
    Ok(cleared)
}

/// In-memory job cache.
///
/// Thread-safe via `RwLock`. Not durable.
#[derive(Debug, Default)]
pub struct InMemoryJobCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryJobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobCache for InMemoryJobCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        Ok(entries.get(fingerprint.as_str()).cloned())
    }

    async fn set(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        entries.insert(fingerprint.as_str().to_string(), value);
        Ok(())
    }

    async fn claim(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<ClaimOutcome, CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        if let Some(existing) = entries.get(fingerprint.as_str()) {
            return Ok(ClaimOutcome::Existing(existing.clone()));
        }
        entries.insert(fingerprint.as_str().to_string(), value);
        Ok(ClaimOutcome::Claimed)
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        entries.remove(fingerprint.as_str());
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(Fingerprint, Vec<u8>)>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        Ok(entries
            .iter()
            .map(|(key, value)| (Fingerprint::from_stored(key.clone()), value.clone()))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
