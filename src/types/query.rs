//! Query parameters and the deterministic job fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A spatial-temporal clustering query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in coordinate degrees
    pub radius: f64,
    /// Window start, epoch seconds (inclusive)
    pub start: i64,
    /// Window end, epoch seconds (exclusive)
    pub end: i64,
    /// Requested cluster count
    pub k: usize,
}

/// Client input errors raised while parsing or validating a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("malformed parameter `{field}`: {value:?}")]
    Malformed { field: &'static str, value: String },
    #[error("parameter `{field}` out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl QueryParams {
    /// Parse raw request parameters.
    ///
    /// Timestamps are accepted as floating point epoch seconds and floored.
    /// `k` falls back to `default_k` when absent.
    pub fn parse(
        lat: &str,
        lng: &str,
        radius: &str,
        start: &str,
        end: &str,
        k: Option<&str>,
        default_k: usize,
    ) -> Result<Self, QueryError> {
        let k = match k {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| QueryError::Malformed {
                field: "clusters",
                value: raw.to_string(),
            })?,
            None => default_k,
        };

        Ok(Self {
            lat: parse_float("lat", lat)?,
            lng: parse_float("lng", lng)?,
            radius: parse_float("radius", radius)?,
            start: parse_epoch("start", start)?,
            end: parse_epoch("end", end)?,
            k,
        })
    }

    /// Range checks that must pass before a job is created.
    pub fn validate(&self, max_clusters: usize) -> Result<(), QueryError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(out_of_range("lat", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(out_of_range("lng", "must be within [-180, 180]"));
        }
        if self.radius <= 0.0 {
            return Err(out_of_range("radius", "must be positive"));
        }
        if self.start >= self.end {
            return Err(out_of_range("end", "must be after start"));
        }
        if self.start_time().is_none() {
            return Err(out_of_range("start", "not a representable timestamp"));
        }
        if self.end_time().is_none() {
            return Err(out_of_range("end", "not a representable timestamp"));
        }
        if self.k == 0 || self.k > max_clusters {
            return Err(out_of_range(
                "clusters",
                &format!("must be within [1, {max_clusters}]"),
            ));
        }
        Ok(())
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end, 0)
    }

    /// Deterministic cache key for this query.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!(
            "{}/{}/{}/{}/{}/{}",
            canonical(self.lat),
            canonical(self.lng),
            canonical(self.radius),
            self.start,
            self.end,
            self.k
        ))
    }
}

/// Cache key identifying one query's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Rebuild from a key read back out of a job cache.
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `-0.0` and `0.0` must share a key.
fn canonical(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn out_of_range(field: &'static str, reason: &str) -> QueryError {
    QueryError::OutOfRange {
        field,
        reason: reason.to_string(),
    }
}

fn parse_float(field: &'static str, raw: &str) -> Result<f64, QueryError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(QueryError::Malformed {
            field,
            value: raw.to_string(),
        }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_epoch(field: &'static str, raw: &str) -> Result<i64, QueryError> {
    let secs = parse_float(field, raw)?.floor();
    // i64::MAX is not exactly representable; stay strictly inside the range
    if secs < -9.0e18 || secs > 9.0e18 {
        return Err(out_of_range(field, "timestamp overflow"));
    }
    Ok(secs as i64)
}
