//! Gateway handlers: liveness, health and the clustering search.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::envelope::ApiErrorResponse;
use crate::orchestrator::{JobOrchestrator, SubmitError, Submission};
use crate::types::{QueryError, QueryParams};

// ============================================================================
// State
// ============================================================================

/// Shared state for gateway handlers
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<JobOrchestrator>,
    /// Cluster count when `?clusters=` is absent
    pub default_clusters: usize,
    pub max_clusters: usize,
}

// ============================================================================
// Liveness / Health
// ============================================================================

/// GET /
pub async fn index() -> &'static str {
    "geosift is running"
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Free job queue slots
    pub queue_capacity: usize,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        queue_capacity: state.orchestrator.queue_capacity(),
    })
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub clusters: Option<String>,
}

/// GET /analysis/v1.0/search/:lat/:lng/:radius/:start/:end?clusters=K
///
/// Returns the job JSON: cached bytes verbatim, or the freshly claimed NEW job.
pub async fn search(
    State(state): State<GatewayState>,
    Path((lat, lng, radius, start, end)): Path<(String, String, String, String, String)>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = match QueryParams::parse(
        &lat,
        &lng,
        &radius,
        &start,
        &end,
        params.clusters.as_deref(),
        state.default_clusters,
    )
    .and_then(|q| q.validate(state.max_clusters).map(|()| q))
    {
        Ok(q) => q,
        Err(e @ QueryError::Malformed { .. }) => {
            debug!(error = %e, "Rejecting malformed search");
            return ApiErrorResponse::not_found(e.to_string());
        }
        Err(e @ QueryError::OutOfRange { .. }) => {
            debug!(error = %e, "Rejecting out-of-range search");
            return ApiErrorResponse::bad_request(e.to_string());
        }
    };

    match state.orchestrator.submit(query).await {
        Ok(Submission::Existing(bytes)) => json_bytes(bytes),
        Ok(Submission::Accepted(job)) => match job.to_bytes() {
            Ok(bytes) => json_bytes(bytes),
            Err(e) => ApiErrorResponse::internal(format!("Failed to encode job: {e}")),
        },
        Err(e @ (SubmitError::QueueFull | SubmitError::Closed)) => {
            ApiErrorResponse::service_unavailable(e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Search submission failed");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

fn json_bytes(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response()
}
