//! API route definitions.

use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, render, requests};
use crate::middleware::{cache_control, cors_layer, request_id};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(render_routes(Arc::clone(&state)))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/.requests", get(requests::remaining))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn render_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/{login}", get(render::render_account))
        .route("/{login}/{repository}", get(render::render_repository))
        .route_layer(middleware::from_fn_with_state(state, cache_control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppSettings;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use metrica_github::MockedUpstream;
    use metrica_plugins::{PipelineSettings, PluginPipeline, builtin_plugins};
    use tower::ServiceExt;

    fn app() -> Router {
        let pipeline = PluginPipeline::new(builtin_plugins(), Vec::new(), PipelineSettings::default());
        let state = AppState::new(
            AppSettings::default(),
            Arc::new(pipeline),
            Arc::new(MockedUpstream::new()),
            None,
        );
        create_router(Arc::new(state))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let (status, headers, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-request-id"));
        assert!(body.contains("\"healthy\""));
    }

    #[tokio::test]
    async fn test_ready_without_templates() {
        let (status, _, _) = get(app(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_requests_defaults_without_tracker() {
        let (status, _, body) = get(app(), "/.requests").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["rest"]["remaining"], 0);
        assert_eq!(value["graphql"]["limit"], 0);
    }

    #[tokio::test]
    async fn test_invalid_login_is_rejected() {
        let (status, headers, body) = get(app(), "/.hidden").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad request: username seems invalid");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=1800");
    }

    #[tokio::test]
    async fn test_unregistered_template_is_rejected() {
        let (status, _, body) = get(app(), "/octocat?template=terminal").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad request: unsupported template");

        let (status, _, _) = get(app(), "/octocat").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
