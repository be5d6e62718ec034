//! Test helper functions and utilities.

use metrica_api::{AppSettings, AppState, create_router};
use metrica_core::ports::UpstreamApi;
use metrica_github::RateLimitTracker;
use metrica_plugins::{PipelineSettings, PluginPipeline, builtin_plugins};
use metrica_render::builtin_templates;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Application state over the builtin plugins and templates.
pub fn build_state(settings: AppSettings, upstream: Arc<dyn UpstreamApi>) -> Arc<AppState> {
    build_state_with_tracker(settings, upstream, None)
}

pub fn build_state_with_tracker(
    settings: AppSettings,
    upstream: Arc<dyn UpstreamApi>,
    tracker: Option<Arc<RateLimitTracker>>,
) -> Arc<AppState> {
    let pipeline = PluginPipeline::new(
        builtin_plugins(),
        builtin_templates(),
        PipelineSettings::default(),
    );
    Arc::new(AppState::new(settings, Arc::new(pipeline), upstream, tracker))
}

/// Start an API server for testing and return its address.
pub async fn start_test_server(
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Test server failed");
        }
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    Ok((addr, handle))
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// API test client with base URL.
#[derive(Clone)]
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    /// GET with an `x-metrics-session` header.
    pub async fn get_with_session(
        &self,
        path: &str,
        session: &str,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .header("x-metrics-session", session)
            .send()
            .await
    }

    /// Check health endpoint.
    pub async fn health(&self) -> anyhow::Result<bool> {
        let resp = self.get("/health").await?;
        Ok(resp.status().is_success())
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: std::time::Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Operation timed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ScriptedUpstream, settings};

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let result = wait_for(
            std::time::Duration::from_secs(1),
            std::time::Duration::from_millis(10),
            || async { true },
        )
        .await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let result = wait_for(
            std::time::Duration::from_millis(100),
            std::time::Duration::from_millis(10),
            || async { false },
        )
        .await;
        assert!(!result);
    }

    #[tokio::test]
    async fn test_server_starts() {
        let state = build_state(settings(), Arc::new(ScriptedUpstream::new()));
        let (addr, handle) = start_test_server(state).await.unwrap();
        assert!(ApiTestClient::new(addr).health().await.unwrap());
        handle.abort();
    }
}
