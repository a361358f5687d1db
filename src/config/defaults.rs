//! System-wide default constants.
//!
//! Grouped by subsystem. Every value here can be overridden from
//! `geosift.toml`, the environment, or the command line.

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:5000";

// ============================================================================
// Storage
// ============================================================================

/// sled data directory (post store + job cache trees).
pub const DATA_DIR: &str = "./data";

/// Attempts to open the store before giving up at startup.
pub const STORAGE_CONNECT_ATTEMPTS: u32 = 10;

/// First retry delay (ms); doubles per attempt.
pub const STORAGE_INITIAL_BACKOFF_MS: u64 = 500;

/// Retry delay ceiling (ms).
pub const STORAGE_MAX_BACKOFF_MS: u64 = 8_000;

// ============================================================================
// Jobs
// ============================================================================

/// Worker tasks draining the job queue.
pub const JOB_WORKERS: usize = 4;

/// Queued jobs beyond the ones being processed. Submissions past this are rejected.
pub const JOB_QUEUE_DEPTH: usize = 64;

/// Maximum posts returned by one retrieval.
pub const SEARCH_RESULT_LIMIT: usize = 5_000;

/// Top posts kept per cluster.
pub const TOP_POSTS_PER_CLUSTER: usize = 5;

/// Cluster count when the request does not specify one.
pub const DEFAULT_CLUSTER_COUNT: usize = 5;

/// Upper bound accepted for a requested cluster count.
pub const MAX_CLUSTER_COUNT: usize = 50;

// ============================================================================
// k-means
// ============================================================================

/// Lloyd iteration cap.
pub const KMEANS_MAX_ITERATIONS: usize = 100;

/// Fixed seed for k-means++ (None = entropy).
pub const KMEANS_SEED: Option<u64> = None;
