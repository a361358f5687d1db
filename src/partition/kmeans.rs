//! Batch k-means (Lloyd) partitioner for 2-d coordinates.
//!
//! Centroids are seeded with k-means++ over the distinct points, so the
//! initial centroids are pairwise distinct. A cluster that empties during an
//! iteration takes over the point farthest from its own centroid among the
//! clusters that still hold more than one point. Since `k` never exceeds the
//! number of distinct points, such a point always exists.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{sq_dist, validate_input, Cluster, PartitionError, Partitioner};
use crate::config::defaults::{KMEANS_MAX_ITERATIONS, KMEANS_SEED};

/// k-means tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Upper bound on Lloyd iterations
    pub max_iterations: usize,
    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: KMEANS_MAX_ITERATIONS,
            seed: KMEANS_SEED,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KMeansPartitioner {
    config: KMeansConfig,
}

impl KMeansPartitioner {
    pub const fn new(config: KMeansConfig) -> Self {
        Self { config }
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(&self, coordinates: &[[f64; 2]], k: usize) -> Result<Vec<Cluster>, PartitionError> {
        let distinct = validate_input(coordinates, k)?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut centroids = seed_centroids(&distinct, k, &mut rng);
        let mut assignments = vec![usize::MAX; coordinates.len()];

        let mut iterations = 0;
        for _ in 0..self.config.max_iterations.max(1) {
            iterations += 1;
            let mut changed = assign_nearest(coordinates, &centroids, &mut assignments);
            changed |= repair_empty(coordinates, &mut assignments, &mut centroids);
            update_means(coordinates, &assignments, &mut centroids);
            if !changed {
                break;
            }
        }
        trace!(points = coordinates.len(), k, iterations, "k-means finished");

        let mut clusters: Vec<Cluster> = centroids
            .into_iter()
            .enumerate()
            .map(|(label, centroid)| Cluster {
                label,
                members: Vec::new(),
                centroid,
            })
            .collect();
        for (row, &label) in assignments.iter().enumerate() {
            clusters[label].members.push(row);
        }
        if let Some(empty) = clusters.iter().find(|c| c.members.is_empty()) {
            return Err(PartitionError::EmptyCluster { label: empty.label });
        }
        Ok(clusters)
    }

    fn name(&self) -> &'static str {
        "k-means"
    }
}

/// k-means++ seeding over distinct points.
fn seed_centroids(distinct: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(distinct[rng.gen_range(0..distinct.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = distinct
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| sq_dist(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        let next = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            // Only reachable with subnormal weight sums; fall back to the farthest point
            Err(_) => weights
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(i, _)| i),
        };
        centroids.push(distinct[next]);
    }
    centroids
}

/// Assign each row to its nearest centroid. Returns true if any row moved.
fn assign_nearest(coordinates: &[[f64; 2]], centroids: &[[f64; 2]], assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for (point, slot) in coordinates.iter().zip(assignments.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f64::MAX;
        for (i, centroid) in centroids.iter().enumerate() {
            let dist = sq_dist(point, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        if *slot != best {
            *slot = best;
            changed = true;
        }
    }
    changed
}

/// Refill empty clusters. Returns true if any row moved.
fn repair_empty(coordinates: &[[f64; 2]], assignments: &mut [usize], centroids: &mut [[f64; 2]]) -> bool {
    let mut counts = vec![0usize; centroids.len()];
    for &label in assignments.iter() {
        counts[label] += 1;
    }

    let mut repaired = false;
    while let Some(empty) = counts.iter().position(|&c| c == 0) {
        let donor = assignments
            .iter()
            .enumerate()
            .filter(|&(_, &label)| counts[label] > 1)
            .map(|(row, &label)| (row, sq_dist(&coordinates[row], &centroids[label])))
            .filter(|(_, dist)| *dist > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let Some((row, _)) = donor else {
            break;
        };
        counts[assignments[row]] -= 1;
        assignments[row] = empty;
        counts[empty] += 1;
        centroids[empty] = coordinates[row];
        repaired = true;
    }
    repaired
}

/// Move each non-empty cluster's centroid to the mean of its members.
#[allow(clippy::cast_precision_loss)]
fn update_means(coordinates: &[[f64; 2]], assignments: &[usize], centroids: &mut [[f64; 2]]) {
    let mut sums = vec![[0.0f64; 2]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (point, &label) in coordinates.iter().zip(assignments) {
        sums[label][0] += point[0];
        sums[label][1] += point[1];
        counts[label] += 1;
    }
    for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *centroid = [sum[0] / count as f64, sum[1] / count as f64];
        }
    }
}
