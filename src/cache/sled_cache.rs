//! sled-backed job cache
//!
//! Stored in the `jobs` tree. Key: fingerprint bytes. Value: job JSON.
//! Writes are not flushed individually; sled flushes in the background and
//! reads see every completed write immediately.

use async_trait::async_trait;
use std::path::Path;

use super::{CacheError, ClaimOutcome, JobCache};
use crate::types::Fingerprint;

const JOBS_TREE: &str = "jobs";

impl From<sled::Error> for CacheError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[derive(Clone)]
pub struct SledJobCache {
    tree: sled::Tree,
}

impl SledJobCache {
    /// Open or create a standalone database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Use the `jobs` tree of an already opened database.
    pub fn from_db(db: &sled::Db) -> Result<Self, CacheError> {
        Ok(Self {
            tree: db.open_tree(JOBS_TREE)?,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl JobCache for SledJobCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self
            .tree
            .get(fingerprint.as_str().as_bytes())?
            .map(|v| v.to_vec()))
    }

    async fn set(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError> {
        self.tree.insert(fingerprint.as_str().as_bytes(), value)?;
        Ok(())
    }

    async fn claim(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<ClaimOutcome, CacheError> {
        let outcome = self
            .tree
            .compare_and_swap(fingerprint.as_str().as_bytes(), None::<&[u8]>, Some(value))?;
        match outcome {
            Ok(()) => Ok(ClaimOutcome::Claimed),
            Err(conflict) => match conflict.current {
                Some(current) => Ok(ClaimOutcome::Existing(current.to_vec())),
                // Absent on conflict cannot happen when expecting absence
                None => Err(CacheError::Storage(format!(
                    "claim conflict without a current value for {fingerprint}"
                ))),
            },
        }
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        self.tree.remove(fingerprint.as_str().as_bytes())?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(Fingerprint, Vec<u8>)>, CacheError> {
        self.tree
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                let key = String::from_utf8(key.to_vec())
                    .map_err(|e| CacheError::Storage(format!("non-UTF-8 job key: {e}")))?;
                Ok((Fingerprint::from_stored(key), value.to_vec()))
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
