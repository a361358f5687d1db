//! HTTP gateway using Axum
//!
//! Accepts clustering searches, hands them to the [`JobOrchestrator`] and
//! answers with the current job JSON. Clients poll the same URL until the
//! status is `DONE` or `FAILED`.
//!
//! [`JobOrchestrator`]: crate::orchestrator::JobOrchestrator

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::GatewayState;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// CORS for the `/analysis` routes. An empty origin list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    tracing::info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: GatewayState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(&server.cors_origins);

    Router::new()
        .nest("/analysis", routes::analysis_routes(state.clone()).layer(cors))
        .merge(routes::service_routes(state))
        .layer(TraceLayer::new_for_http())
}
