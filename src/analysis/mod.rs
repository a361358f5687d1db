//! Cluster Analyzer
//!
//! Per cluster, joins each member row back to its PostRecord and builds:
//! - word popularity: sum of `2 + retweet + favorite` over posts using the word
//! - word polarity: sum of post polarity ÷ popularity
//! - co-occurrence graph: `connections[w][u]` = posts containing both, `w != u`
//! - top posts by `retweet + favorite + polarity`, ties in retrieval order
//!
//! Each distinct word counts once per post, so the graph is symmetric.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::partition::Cluster;
use crate::preprocess::PreparedRecords;
use crate::types::{ClusterResult, ConnectionGraph, LocationKey, PostRecord, RankedPosts, TopPost};

/// How a coordinate row is joined back to its PostRecord.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Row `i` is `records[i]`; exact.
    #[default]
    RowIndex,
    /// Rebuild the rounded LocationKey from the row and look it up.
    /// Colliding posts resolve to the last one retrieved.
    LocationKey,
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowIndex => write!(f, "row_index"),
            Self::LocationKey => write!(f, "location_key"),
        }
    }
}

/// Internal-consistency errors. Any of these fails the whole job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("cluster {label}: row {row} has no record")]
    MissingRecord { label: usize, row: usize },
    #[error("cluster {label}: no record for location {key} (row {row})")]
    MissingLocation {
        label: usize,
        row: usize,
        key: LocationKey,
    },
}

/// Analyze every cluster in parallel. Output order follows `clusters`.
pub fn analyze_clusters(
    clusters: &[Cluster],
    prepared: &PreparedRecords,
    join: JoinStrategy,
    top_k: usize,
) -> Result<Vec<ClusterResult>, AnalysisError> {
    clusters
        .par_iter()
        .map(|cluster| analyze_cluster(cluster, prepared, join, top_k))
        .collect()
}

/// Analyze one cluster.
pub fn analyze_cluster(
    cluster: &Cluster,
    prepared: &PreparedRecords,
    join: JoinStrategy,
    top_k: usize,
) -> Result<ClusterResult, AnalysisError> {
    let mut stats = WordStats::default();
    let mut ranked: Vec<(usize, TopPost)> = Vec::new();
    let mut ranked_rows = HashSet::new();

    for &row in &cluster.members {
        let record_row = resolve(prepared, cluster.label, row, join)?;
        let Some(post) = prepared.record(record_row) else {
            return Err(AnalysisError::MissingRecord {
                label: cluster.label,
                row: record_row,
            });
        };

        if ranked_rows.insert(record_row) {
            ranked.push((
                record_row,
                TopPost {
                    id: post.id.clone(),
                    score: post.engagement_score(),
                },
            ));
        }
        stats.add_post(post);
    }

    // Highest score first; equal scores keep retrieval order
    ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
    ranked.truncate(top_k);

    let (words, polarities, connections) = stats.finish();
    Ok(ClusterResult {
        label: cluster.label,
        words,
        polarities,
        connections,
        center: cluster.centroid,
        tweets: RankedPosts(ranked.into_iter().map(|(_, post)| post).collect()),
    })
}

fn resolve(
    prepared: &PreparedRecords,
    label: usize,
    row: usize,
    join: JoinStrategy,
) -> Result<usize, AnalysisError> {
    match join {
        JoinStrategy::RowIndex => {
            if row < prepared.len() {
                Ok(row)
            } else {
                Err(AnalysisError::MissingRecord { label, row })
            }
        }
        JoinStrategy::LocationKey => {
            let coords = prepared
                .coordinates()
                .get(row)
                .ok_or(AnalysisError::MissingRecord { label, row })?;
            let key = LocationKey::from_row(coords);
            prepared
                .lookup(&key)
                .ok_or(AnalysisError::MissingLocation { label, row, key })
        }
    }
}

/// Running word accumulators for one cluster.
#[derive(Debug, Default)]
struct WordStats {
    popularity: BTreeMap<String, u64>,
    polarity_sum: BTreeMap<String, f64>,
    connections: ConnectionGraph,
}

impl WordStats {
    fn add_post(&mut self, post: &PostRecord) {
        let words = post.distinct_words();
        let weight = post.word_weight();

        for &word in &words {
            let popularity = self.popularity.entry(word.to_string()).or_insert(0);
            *popularity = popularity.saturating_add(weight);
            *self.polarity_sum.entry(word.to_string()).or_insert(0.0) += post.polarity;

            let edges = self.connections.entry(word.to_string()).or_default();
            for &other in &words {
                if other != word {
                    *edges.entry(other.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> (BTreeMap<String, u64>, BTreeMap<String, f64>, ConnectionGraph) {
        let polarities = self
            .polarity_sum
            .into_iter()
            .map(|(word, sum)| {
                let popularity = self.popularity.get(&word).copied().unwrap_or(0);
                // popularity >= 2 per post by construction
                let average = if popularity == 0 {
                    0.0
                } else {
                    sum / popularity as f64
                };
                (word, average)
            })
            .collect();
        (self.popularity, polarities, self.connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::prepare;
    use crate::types::GeoPoint;
    use chrono::Utc;

    fn post(id: &str, lat: f64, words: &[&str], polarity: f64, rt: u64, fav: u64) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            location: GeoPoint::new(lat, 13.4),
            created_at: Utc::now(),
            words: words.iter().map(|w| (*w).to_string()).collect(),
            polarity,
            retweet_count: rt,
            favorite_count: fav,
        }
    }

    fn whole(prepared: &PreparedRecords) -> Cluster {
        Cluster {
            label: 0,
            members: (0..prepared.len()).collect(),
            centroid: [52.0, 13.4],
        }
    }

    fn sample() -> PreparedRecords {
        prepare(vec![
            post("a", 52.0, &["sun", "beach", "sun"], 0.5, 3, 1),
            post("b", 52.1, &["sun", "rain"], -0.25, 0, 0),
            post("c", 52.2, &["rain"], 1.0, 1, 1),
        ])
    }

    #[test]
    fn test_word_popularity_and_polarity() {
        let prepared = sample();
        let result = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::RowIndex, 5).unwrap();

        // sun: a (2+3+1=6) + b (2) = 8, polarity (0.5 - 0.25) / 8
        assert_eq!(result.words["sun"], 8);
        assert!((result.polarities["sun"] - 0.25 / 8.0).abs() < 1e-12);
        // rain: b (2) + c (4) = 6, polarity (-0.25 + 1.0) / 6
        assert_eq!(result.words["rain"], 6);
        assert!((result.polarities["rain"] - 0.75 / 6.0).abs() < 1e-12);
        assert_eq!(result.words["beach"], 6);
        assert_eq!(result.center, [52.0, 13.4]);
    }

    #[test]
    fn test_connections_symmetric_without_self_edges() {
        let prepared = sample();
        let result = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::RowIndex, 5).unwrap();

        for (word, edges) in &result.connections {
            assert!(!edges.contains_key(word), "self edge on {word}");
            for (other, count) in edges {
                assert_eq!(result.connections[other][word], *count, "{word} <-> {other}");
            }
        }
        assert_eq!(result.connections["sun"]["beach"], 1);
        assert_eq!(result.connections["sun"]["rain"], 1);
        assert!(result.connections["rain"].get("beach").is_none());
        // single-word posts still get a node
        assert!(result.connections.contains_key("rain"));
    }

    #[test]
    fn test_top_posts_sorted_and_stable() {
        let prepared = prepare(vec![
            post("p0", 52.00, &["x"], 0.0, 5, 0),
            post("p1", 52.01, &["x"], 1.0, 4, 0),
            post("p2", 52.02, &["x"], 0.0, 2, 2),
            post("p3", 52.03, &["x"], 0.0, 9, 0),
            post("p4", 52.04, &["x"], 0.0, 1, 0),
            post("p5", 52.05, &["x"], -1.0, 6, 0),
            post("p6", 52.06, &["x"], 0.0, 0, 0),
        ]);
        let result = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::RowIndex, 5).unwrap();

        let ids: Vec<&str> = result.tweets.iter().map(|p| p.id.as_str()).collect();
        // scores: p0=5 p1=5 p2=4 p3=9 p4=1 p5=5 p6=0
        assert_eq!(ids, vec!["p3", "p0", "p1", "p5", "p2"]);
        let scores: Vec<f64> = result.tweets.iter().map(|p| p.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_top_posts_shorter_than_k() {
        let prepared = sample();
        let result = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::RowIndex, 5).unwrap();
        assert_eq!(result.tweets.len(), 3);
    }

    #[test]
    fn test_location_key_join_matches_row_join_without_collisions() {
        let prepared = sample();
        let by_row = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::RowIndex, 5).unwrap();
        let by_key = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::LocationKey, 5).unwrap();
        assert_eq!(by_row, by_key);
    }

    #[test]
    fn test_location_key_join_collapses_collisions() {
        let prepared = prepare(vec![
            post("first", 52.000_000_001, &["lost"], 0.0, 0, 0),
            post("second", 52.000_000_002, &["kept"], 0.0, 0, 0),
        ]);
        let result = analyze_cluster(&whole(&prepared), &prepared, JoinStrategy::LocationKey, 5).unwrap();
        assert!(!result.words.contains_key("lost"));
        assert_eq!(result.words["kept"], 4);
        assert_eq!(result.tweets.len(), 1);
    }

    #[test]
    fn test_missing_row_is_an_error() {
        let prepared = sample();
        let cluster = Cluster {
            label: 2,
            members: vec![0, 7],
            centroid: [0.0, 0.0],
        };
        assert_eq!(
            analyze_cluster(&cluster, &prepared, JoinStrategy::RowIndex, 5),
            Err(AnalysisError::MissingRecord { label: 2, row: 7 })
        );
        assert!(analyze_cluster(&cluster, &prepared, JoinStrategy::LocationKey, 5).is_err());
    }

    #[test]
    fn test_analyze_clusters_keeps_order() {
        let prepared = sample();
        let clusters = vec![
            Cluster { label: 0, members: vec![2], centroid: [52.2, 13.4] },
            Cluster { label: 1, members: vec![0, 1], centroid: [52.05, 13.4] },
        ];
        let results = analyze_clusters(&clusters, &prepared, JoinStrategy::RowIndex, 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label, 0);
        assert_eq!(results[0].tweets.0[0].id, "c");
        assert_eq!(results[1].label, 1);
        assert_eq!(results[1].tweets.len(), 2);
    }
}
