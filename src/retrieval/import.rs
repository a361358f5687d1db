//! JSON-lines post import
//!
//! One object per line:
//! `{"id": "...", "loc": [lat, lng], "created_at": ..., "words": [...],
//!   "polarity": 0.1, "retweet_count": 0, "favorite_count": 0}`
//!
//! `id` may be a string or an integer. `created_at` may be RFC 3339 or
//! integer epoch seconds. Blank lines are skipped.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::BufRead;

use crate::types::{GeoPoint, PostRecord};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("read error at line {line}: {source}")]
    Io { line: usize, source: std::io::Error },
    #[error("invalid JSON at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("invalid post at line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTime {
    Epoch(i64),
    Rfc3339(String),
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: RawId,
    loc: [f64; 2],
    created_at: RawTime,
    #[serde(default)]
    words: Vec<String>,
    #[serde(default)]
    polarity: f64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    favorite_count: u64,
}

impl RawPost {
    fn into_record(self) -> Result<PostRecord, String> {
        let [lat, lng] = self.loc;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {lat} out of range"));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(format!("longitude {lng} out of range"));
        }
        if !self.polarity.is_finite() {
            return Err("polarity must be finite".to_string());
        }

        let created_at = match self.created_at {
            RawTime::Epoch(secs) => {
                DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("timestamp {secs} out of range"))?
            }
            RawTime::Rfc3339(text) => DateTime::parse_from_rfc3339(&text)
                .map_err(|e| format!("created_at {text:?}: {e}"))?
                .with_timezone(&Utc),
        };
        let id = match self.id {
            RawId::Text(id) => id,
            RawId::Number(n) => n.to_string(),
        };

        Ok(PostRecord {
            id,
            location: GeoPoint::new(lat, lng),
            created_at,
            words: self.words,
            polarity: self.polarity,
            retweet_count: self.retweet_count,
            favorite_count: self.favorite_count,
        })
    }
}

/// Parse every post in `reader`. Stops at the first bad line.
pub fn read_posts<R: BufRead>(reader: R) -> Result<Vec<PostRecord>, ImportError> {
    let mut posts = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| ImportError::Io { line: line_no, source })?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawPost = serde_json::from_str(&line).map_err(|source| ImportError::Json {
            line: line_no,
            source,
        })?;
        let post = raw
            .into_record()
            .map_err(|reason| ImportError::Invalid { line: line_no, reason })?;
        posts.push(post);
    }
    Ok(posts)
}
