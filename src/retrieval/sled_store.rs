//! sled-backed post store
//!
//! Stored in the `posts` tree.
//! Key: created-at seconds (sign bit flipped, big-endian) followed by the post id,
//! so a time window is one contiguous range scan.
//! Value: JSON-serialized PostRecord.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

use super::{PostStore, RetrievalError, RetrievalQuery};
use crate::types::PostRecord;

const POSTS_TREE: &str = "posts";

impl From<sled::Error> for RetrievalError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[derive(Clone)]
pub struct SledPostStore {
    tree: sled::Tree,
}

impl SledPostStore {
    /// Open or create a standalone database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RetrievalError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Use the `posts` tree of an already opened database.
    pub fn from_db(db: &sled::Db) -> Result<Self, RetrievalError> {
        Ok(Self {
            tree: db.open_tree(POSTS_TREE)?,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn scan(&self, query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError> {
        let range = time_prefix(&query.start)..time_prefix(&query.end);
        let mut found = Vec::new();
        let mut scanned = 0usize;
        for entry in self.tree.range(range) {
            let (_, value) = entry?;
            scanned += 1;
            let post: PostRecord = serde_json::from_slice(&value)?;
            if query.matches(&post) {
                found.push(post);
            }
        }
        debug!(scanned, matched = found.len(), "Post range scan");
        Ok(query.rank_and_cap(found))
    }
}

/// Order-preserving encoding of the creation second.
#[allow(clippy::cast_sign_loss)]
fn time_prefix(at: &DateTime<Utc>) -> [u8; 8] {
    ((at.timestamp() as u64) ^ (1 << 63)).to_be_bytes()
}

fn post_key(post: &PostRecord) -> Vec<u8> {
    let mut key = time_prefix(&post.created_at).to_vec();
    key.extend_from_slice(post.id.as_bytes());
    key
}

#[async_trait]
impl PostStore for SledPostStore {
    async fn find_posts(&self, query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError> {
        let store = self.clone();
        let query = *query;
        tokio::task::spawn_blocking(move || store.scan(&query))
            .await
            .map_err(|e| RetrievalError::Storage(format!("scan task failed: {e}")))?
    }

    async fn insert_posts(&self, posts: Vec<PostRecord>) -> Result<usize, RetrievalError> {
        let mut batch = sled::Batch::default();
        let count = posts.len();
        for post in &posts {
            batch.insert(post_key(post), serde_json::to_vec(post)?);
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush_async().await?;
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
