//! Post retrieval
//!
//! [`PostStore`] answers one question per job: which posts fall inside a
//! radius around a center point during `[start, end)`. Results are sorted by
//! retweet count then favorite count, both descending, and capped.
//!
//! Distance is planar in coordinate degrees, matching a flat 2d geo index.

mod import;
mod sled_store;

pub use import::{read_posts, ImportError};
pub use sled_store::SledPostStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::types::{GeoPoint, PostRecord, QueryParams};

/// Retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("query window not representable: {start}..{end}")]
    InvalidWindow { start: i64, end: i64 },
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A spatial-temporal lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalQuery {
    pub center: GeoPoint,
    /// Coordinate degrees
    pub radius: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: usize,
}

impl RetrievalQuery {
    pub fn from_params(params: &QueryParams, limit: usize) -> Result<Self, RetrievalError> {
        let window = RetrievalError::InvalidWindow {
            start: params.start,
            end: params.end,
        };
        let (Some(start), Some(end)) = (params.start_time(), params.end_time()) else {
            return Err(window);
        };
        Ok(Self {
            center: GeoPoint::new(params.lat, params.lng),
            radius: params.radius,
            start,
            end,
            limit,
        })
    }

    pub fn matches(&self, post: &PostRecord) -> bool {
        post.created_at >= self.start
            && post.created_at < self.end
            && self.center.planar_distance(&post.location) <= self.radius
    }

    /// Sort by engagement counters (stable) and apply the limit.
    pub fn rank_and_cap(&self, mut posts: Vec<PostRecord>) -> Vec<PostRecord> {
        posts.sort_by(|a, b| {
            b.retweet_count
                .cmp(&a.retweet_count)
                .then(b.favorite_count.cmp(&a.favorite_count))
        });
        posts.truncate(self.limit);
        posts
    }
}

/// Source of posts for the pipeline.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn find_posts(&self, query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError>;

    /// Add posts; returns the number written.
    async fn insert_posts(&self, posts: Vec<PostRecord>) -> Result<usize, RetrievalError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// In-memory post store. Counts queries so tests can assert a cache hit
/// never reached retrieval.
#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    posts: RwLock<Vec<PostRecord>>,
    queries: AtomicUsize,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<PostRecord>) -> Self {
        Self {
            posts: RwLock::new(posts),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn find_posts(&self, query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let posts = self
            .posts
            .read()
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;
        let found = posts.iter().filter(|p| query.matches(p)).cloned().collect();
        Ok(query.rank_and_cap(found))
    }

    async fn insert_posts(&self, new_posts: Vec<PostRecord>) -> Result<usize, RetrievalError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;
        let count = new_posts.len();
        posts.extend(new_posts);
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
