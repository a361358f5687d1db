//! geosift: spatial clustering of geotagged posts
//!
//! Answers "what are people talking about around here?" for a center point,
//! radius and time window. Matching posts are grouped into K spatial
//! clusters; each cluster gets a word co-occurrence graph, engagement
//! weighted word polarity, a centroid and its top posts. Work runs in the
//! background and results are cached per query, so clients poll.
//!
//! ## Architecture
//!
//! - **Retrieval**: `PostStore` lookup by radius and `[start, end)` window
//! - **Preprocess**: coordinate matrix plus LocationKey index
//! - **Partition**: `Partitioner` contract, k-means implementation
//! - **Analysis**: per-cluster word statistics and top posts (rayon)
//! - **Orchestrator**: job state machine, bounded worker pool, claim-or-join
//! - **Cache**: `JobCache` keyed by query fingerprint (sled or in-memory)
//! - **API**: axum gateway

pub mod analysis;
pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod partition;
pub mod preprocess;
pub mod retrieval;
pub mod types;

pub use config::AppConfig;

pub use types::{
    ClusterResult, Fingerprint, GeoPoint, Job, JobStatus, LocationKey, PostRecord, QueryError,
    QueryParams, RankedPosts, TopPost,
};

pub use analysis::{analyze_cluster, analyze_clusters, JoinStrategy};
pub use cache::{InMemoryJobCache, JobCache, SledJobCache};
pub use orchestrator::{JobOrchestrator, PipelineSettings, SubmitError, Submission};
pub use partition::{Cluster, KMeansPartitioner, Partitioner};
pub use preprocess::{prepare, PreparedRecords};
pub use retrieval::{InMemoryPostStore, PostStore, RetrievalQuery, SledPostStore};
