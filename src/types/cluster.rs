//! Cluster analysis output types

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Word → word → co-occurrence count.
pub type ConnectionGraph = BTreeMap<String, BTreeMap<String, u64>>;

/// Aggregated statistics for one spatial cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Label assigned by the partitioner
    pub label: usize,
    /// Word popularity: accumulated `2 + retweet + favorite` per post
    pub words: BTreeMap<String, u64>,
    /// Engagement-weighted average polarity per word
    pub polarities: BTreeMap<String, f64>,
    /// Symmetric co-occurrence counts, no self-edges
    pub connections: ConnectionGraph,
    /// Cluster centroid as `[lat, lng]`
    pub center: [f64; 2],
    /// Top posts by engagement score, highest first
    pub tweets: RankedPosts,
}

/// A post id with its engagement score.
#[derive(Debug, Clone, PartialEq)]
pub struct TopPost {
    pub id: String,
    pub score: f64,
}

/// Ranked posts serialized as a JSON object `{id: score}` whose key order
/// is the ranking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedPosts(pub Vec<TopPost>);

impl RankedPosts {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopPost> {
        self.0.iter()
    }
}

impl Serialize for RankedPosts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for post in &self.0 {
            map.serialize_entry(&post.id, &post.score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RankedPosts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RankedVisitor;

        impl<'de> Visitor<'de> for RankedVisitor {
            type Value = RankedPosts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of post id to engagement score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut posts = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, score)) = access.next_entry::<String, f64>()? {
                    posts.push(TopPost { id, score });
                }
                Ok(RankedPosts(posts))
            }
        }

        deserializer.deserialize_map(RankedVisitor)
    }
}
