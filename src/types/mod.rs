//! Shared data structures for the clustering pipeline
//!
//! - `post`: PostRecord, GeoPoint and the rounded-coordinate LocationKey
//! - `query`: QueryParams and the deterministic job Fingerprint
//! - `cluster`: ClusterResult and the ranked top-post list
//! - `job`: JobStatus state machine and the cached Job payload

mod cluster;
mod job;
mod post;
mod query;

pub use cluster::*;
pub use job::*;
pub use post::*;
pub use query::*;
