//! Spatial partitioning
//!
//! The pipeline only depends on the [`Partitioner`] contract:
//! - `1 <= k <= distinct points`, otherwise [`PartitionError::InsufficientPoints`]
//! - every input row is assigned to exactly one returned cluster (no noise label)
//! - every returned cluster is non-empty and its centroid is the member mean
//!
//! [`KMeansPartitioner`] is the shipped implementation.

mod kmeans;

pub use kmeans::{KMeansConfig, KMeansPartitioner};

use std::collections::HashSet;

/// One cluster: member row indices into the coordinate matrix plus centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub label: usize,
    pub members: Vec<usize>,
    /// `[lat, lng]`
    pub centroid: [f64; 2],
}

/// Partitioning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("partition count must be at least 1")]
    ZeroClusters,
    #[error(
        "insufficient points for requested partition count: requested {requested}, {available} distinct points available"
    )]
    InsufficientPoints { requested: usize, available: usize },
    #[error("non-finite coordinate at row {row}")]
    NonFiniteCoordinate { row: usize },
    #[error("cluster {label} ended up empty")]
    EmptyCluster { label: usize },
}

/// Partition N points into K clusters.
pub trait Partitioner: Send + Sync {
    fn partition(&self, coordinates: &[[f64; 2]], k: usize) -> Result<Vec<Cluster>, PartitionError>;

    /// Implementation name for logging
    fn name(&self) -> &'static str;
}

/// Check the contract preconditions and return the distinct points in
/// first-occurrence order.
pub fn validate_input(coordinates: &[[f64; 2]], k: usize) -> Result<Vec<[f64; 2]>, PartitionError> {
    if k == 0 {
        return Err(PartitionError::ZeroClusters);
    }
    if let Some(row) = coordinates
        .iter()
        .position(|p| !p[0].is_finite() || !p[1].is_finite())
    {
        return Err(PartitionError::NonFiniteCoordinate { row });
    }

    let distinct = distinct_points(coordinates);
    if k > distinct.len() {
        return Err(PartitionError::InsufficientPoints {
            requested: k,
            available: distinct.len(),
        });
    }
    Ok(distinct)
}

/// Distinct points in first-occurrence order. `-0.0` equals `0.0`.
pub fn distinct_points(coordinates: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut seen = HashSet::with_capacity(coordinates.len());
    coordinates
        .iter()
        .filter(|p| seen.insert(((p[0] + 0.0).to_bits(), (p[1] + 0.0).to_bits())))
        .copied()
        .collect()
}

/// Squared Euclidean distance between two 2-d points.
pub(crate) fn sq_dist(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}
