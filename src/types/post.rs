//! Post types: PostRecord, GeoPoint, LocationKey

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept when deriving a [`LocationKey`] from coordinates.
pub const LOCATION_KEY_DECIMALS: i32 = 8;

/// A latitude / longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar distance in coordinate degrees (flat 2d index semantics).
    pub fn planar_distance(&self, other: &Self) -> f64 {
        (self.lat - other.lat).hypot(self.lng - other.lng)
    }

    pub const fn as_row(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

/// A geotagged short-text post as returned by retrieval.
///
/// Word tokens and polarity arrive pre-computed; nothing in this crate
/// tokenizes or scores text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
    /// Ordered word tokens
    pub words: Vec<String>,
    /// Signed sentiment score
    pub polarity: f64,
    pub retweet_count: u64,
    pub favorite_count: u64,
}

impl PostRecord {
    /// `retweet + favorite + polarity`, used to rank top posts.
    #[allow(clippy::cast_precision_loss)]
    pub fn engagement_score(&self) -> f64 {
        self.retweet_count.saturating_add(self.favorite_count) as f64 + self.polarity
    }

    /// Per-occurrence word weight: `2 + retweet + favorite`.
    pub const fn word_weight(&self) -> u64 {
        2u64.saturating_add(self.retweet_count)
            .saturating_add(self.favorite_count)
    }

    /// Word tokens with duplicates removed, first occurrence wins.
    pub fn distinct_words(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::with_capacity(self.words.len());
        self.words
            .iter()
            .map(String::as_str)
            .filter(|w| seen.insert(*w))
            .collect()
    }

    pub fn location_key(&self) -> LocationKey {
        LocationKey::from_coords(self.location.lat, self.location.lng)
    }
}

/// Join key derived from coordinates rounded to [`LOCATION_KEY_DECIMALS`].
///
/// Stored as scaled integers so the key is `Eq + Hash`. Two distinct posts
/// can round to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey {
    lat: i64,
    lng: i64,
}

impl LocationKey {
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_coords(lat: f64, lng: f64) -> Self {
        let scale = 10f64.powi(LOCATION_KEY_DECIMALS);
        Self {
            lat: (lat * scale).round() as i64,
            lng: (lng * scale).round() as i64,
        }
    }

    pub fn from_row(row: &[f64; 2]) -> Self {
        Self::from_coords(row[0], row[1])
    }
}

impl fmt::Display for LocationKey {
    #[allow(clippy::cast_sign_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10i64.pow(LOCATION_KEY_DECIMALS as u32);
        let part = |v: i64| {
            let sign = if v < 0 { "-" } else { "" };
            format!("{sign}{}.{:08}", v.abs() / scale, v.abs() % scale)
        };
        write!(f, "({}, {})", part(self.lat), part(self.lng))
    }
}
