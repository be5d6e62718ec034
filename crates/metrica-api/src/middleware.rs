//! HTTP middleware for the API server.

use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SESSION_HEADER: &str = "x-metrics-session";

/// Create CORS middleware layer.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(SESSION_HEADER),
        ])
        .allow_origin(Any)
}

/// Inject request ID into each request.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &value {
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Lifetime override in milliseconds from the `cache` query parameter.
pub fn requested_ttl(query: Option<&str>) -> Option<Duration> {
    let raw = query?;
    url::form_urlencoded::parse(raw.as_bytes())
        .find(|(name, _)| name == "cache")
        .and_then(|(_, value)| value.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_millis(ms as u64))
}

/// `Cache-Control` value for a render response.
pub fn cache_control_value(caching: bool, default_ttl: Duration, requested: Option<Duration>) -> String {
    if !caching && requested.is_none() {
        return "no-store, no-cache".to_string();
    }
    let ttl = requested.unwrap_or(default_ttl);
    let secs = (ttl.as_millis() as f64 / 1000.0).round() as u64;
    format!("public, max-age={secs}")
}

/// Advertise how long clients may keep a rendered response.
pub async fn cache_control(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let requested = requested_ttl(request.uri().query());
    let value = cache_control_value(state.settings.caching(), state.settings.cached, requested);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}
