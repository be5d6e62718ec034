//! Provider failures, credential sessions and quota reporting over HTTP.

use metrica_github::{GitHubClient, RateLimitTracker};
use metrica_tests::{
    ApiTestClient, ScriptedUpstream, build_state, build_state_with_tracker, init_test_logging,
    settings, start_test_server, wait_for,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn github(server: &MockServer, token: &str) -> Arc<GitHubClient> {
    Arc::new(
        GitHubClient::with_endpoints(
            Some(token.into()),
            &format!("{}/graphql", server.uri()),
            &server.uri(),
        )
        .expect("Failed to build client"),
    )
}

#[tokio::test]
async fn test_provider_not_found_maps_to_404() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"account": null},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a RepositoryOwner with the login of 'ghost'."}]
        })))
        .mount(&server)
        .await;

    let state = build_state(settings(), github(&server, "default").await);
    let (addr, _handle) = start_test_server(state).await.unwrap();

    let resp = ApiTestClient::new(addr).get("/ghost").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_timeout_carries_request_id() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Something went wrong while executing your query. This may be the result of a timeout, or it could be a GitHub bug. Please include `C0DE:F00D` when reporting this issue."}]
        })))
        .mount(&server)
        .await;

    let state = build_state(settings(), github(&server, "default").await);
    let (addr, _handle) = start_test_server(state).await.unwrap();

    let resp = ApiTestClient::new(addr).get("/octocat").await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.text().await.unwrap();
    assert!(body.contains("failed to execute request C0DE:F00D"), "{body}");
}

#[tokio::test]
async fn test_session_header_selects_credentials() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "token session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"account": {
                "__typename": "User",
                "login": "octocat",
                "name": "The Octocat",
                "avatarUrl": null,
                "createdAt": "2011-01-25T18:44:36Z",
                "followers": {"totalCount": 1}
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let default = Arc::new(ScriptedUpstream::new());
    let state = build_state(metrica_tests::uncached_settings(), default.clone());
    state.register_session("C0FFEE", github(&server, "session-token").await);
    let (addr, _handle) = start_test_server(state).await.unwrap();
    let client = ApiTestClient::new(addr);

    let resp = client.get_with_session("/octocat", "c0ffee").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(default.calls(), 0);

    // Unknown or malformed sessions fall back to the default credentials.
    let resp = client.get_with_session("/octocat", "not-hex").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = client.get_with_session("/octocat", "abcdef").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(default.calls(), 2);
}

#[tokio::test]
async fn test_requests_endpoint_reports_snapshot() {
    init_test_logging();
    let upstream = Arc::new(ScriptedUpstream::new());
    let tracker = Arc::new(RateLimitTracker::new(upstream.clone()));
    tracker.refresh().await;

    let state = build_state_with_tracker(settings(), upstream.clone(), Some(tracker.clone()));
    let (addr, _handle) = start_test_server(state).await.unwrap();
    let client = ApiTestClient::new(addr);

    let resp = client.get("/.requests").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["rest"]["limit"], 5000);
    assert_eq!(body["graphql"]["remaining"], 5000);
    assert_eq!(body["search"]["limit"], 30);

    // Every render marks the counters dirty, failures included.
    assert!(!tracker.is_dirty());
    client.get("/.invalid").await.unwrap();
    assert!(tracker.is_dirty());
    assert!(tracker.refresh_if_dirty().await);
    assert_eq!(upstream.rate_limit_calls(), 2);
}

#[tokio::test]
async fn test_tracker_refreshes_after_traffic() {
    init_test_logging();
    let upstream = Arc::new(ScriptedUpstream::new());
    let tracker = Arc::new(RateLimitTracker::with_intervals(
        upstream.clone(),
        Duration::from_secs(3600),
        Duration::from_millis(50),
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = tracker.spawn(shutdown_rx);

    let state = build_state_with_tracker(settings(), upstream.clone(), Some(tracker.clone()));
    let (addr, _handle) = start_test_server(state).await.unwrap();
    let client = ApiTestClient::new(addr);

    let refreshed = {
        let upstream = upstream.clone();
        wait_for(Duration::from_secs(2), Duration::from_millis(10), move || {
            let upstream = upstream.clone();
            async move { upstream.rate_limit_calls() >= 1 }
        })
        .await
    };
    assert!(refreshed);
    let baseline = upstream.rate_limit_calls();

    for _ in 0..5 {
        client.get("/octocat").await.unwrap();
    }
    let refreshed = {
        let upstream = upstream.clone();
        wait_for(Duration::from_secs(2), Duration::from_millis(10), move || {
            let upstream = upstream.clone();
            async move { upstream.rate_limit_calls() > baseline }
        })
        .await
    };
    assert!(refreshed);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}
