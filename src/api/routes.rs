//! Route definitions
//!
//! - `/` - liveness text
//! - `/health` - queue health
//! - `/analysis/v1.0/search/:lat/:lng/:radius/:start/:end` - clustering search

use axum::{routing::get, Router};

use super::handlers::{self, GatewayState};

/// Search routes (CORS applied by the caller)
pub fn analysis_routes(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/v1.0/search/:lat/:lng/:radius/:start/:end",
            get(handlers::search),
        )
        .with_state(state)
}

/// Liveness and health at root level
pub fn service_routes(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryJobCache;
    use crate::orchestrator::{JobOrchestrator, PipelineSettings};
    use crate::partition::KMeansPartitioner;
    use crate::retrieval::InMemoryPostStore;
    use crate::analysis::JoinStrategy;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn create_test_state() -> GatewayState {
        let orchestrator = JobOrchestrator::start(
            Arc::new(InMemoryPostStore::new()),
            Arc::new(InMemoryJobCache::new()),
            Arc::new(KMeansPartitioner::default()),
            PipelineSettings {
                workers: 1,
                queue_depth: 4,
                result_limit: 5_000,
                top_posts: 5,
                join: JoinStrategy::RowIndex,
            },
            CancellationToken::new(),
        );
        GatewayState {
            orchestrator: Arc::new(orchestrator),
            default_clusters: 5,
            max_clusters: 50,
        }
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let state = create_test_state();
        assert_eq!(get_status(service_routes(state.clone()), "/").await, StatusCode::OK);

        let response = service_routes(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: handlers::HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.queue_capacity, 4);
    }

    #[tokio::test]
    async fn test_search_accepts_valid_query() {
        let app = analysis_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1.0/search/52.5/13.4/0.5/1600000000/1600086400?clusters=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["query"]["k"], 3);
        assert!(v["status"].is_string());
        assert!(v["clusters"].is_array());
    }

    #[tokio::test]
    async fn test_search_malformed_is_not_found() {
        let app = analysis_routes(create_test_state());
        assert_eq!(
            get_status(app.clone(), "/v1.0/search/north/13.4/0.5/0/10").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(app, "/v1.0/search/52.5/13.4/0.5/0/10?clusters=many").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_search_out_of_range_is_bad_request() {
        let app = analysis_routes(create_test_state());
        for uri in [
            "/v1.0/search/95/13.4/0.5/0/10",
            "/v1.0/search/52.5/190/0.5/0/10",
            "/v1.0/search/52.5/13.4/0/0/10",
            "/v1.0/search/52.5/13.4/0.5/10/10",
            "/v1.0/search/52.5/13.4/0.5/0/10?clusters=0",
            "/v1.0/search/52.5/13.4/0.5/0/10?clusters=51",
        ] {
            assert_eq!(get_status(app.clone(), uri).await, StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
