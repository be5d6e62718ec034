//! Test fixtures: a scripted upstream and ready-made settings.

use async_trait::async_trait;
use metrica_api::AppSettings;
use metrica_core::ports::UpstreamApi;
use metrica_core::ratelimit::RateLimitSnapshot;
use metrica_core::{Error, Result};
use metrica_github::MockedUpstream;
use metrica_plugins::PluginSettings;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Deterministic upstream that counts calls and can be slowed down or
/// made to fail.
#[derive(Default)]
pub struct ScriptedUpstream {
    inner: MockedUpstream,
    delay: Duration,
    missing: Vec<String>,
    calendar_timeout: Option<String>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    rate_limit_calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every query for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Resolve `login` to no account at all.
    pub fn with_missing(mut self, login: &str) -> Self {
        self.missing.push(login.to_string());
        self
    }

    /// Fail calendar queries the way the provider reports a timeout.
    pub fn with_calendar_timeout(mut self, request: &str) -> Self {
        self.calendar_timeout = Some(request.to_string());
        self
    }

    /// Queries received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of queries in flight at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn rate_limit_calls(&self) -> usize {
        self.rate_limit_calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, query: &str, variables: Value) -> Result<Value> {
        let login = variables["login"].as_str().unwrap_or_default();
        if query.contains("repositoryOwner") && self.missing.iter().any(|m| m == login) {
            return Ok(json!({ "account": null }));
        }
        if query.contains("contributionsCollection") {
            if let Some(request) = &self.calendar_timeout {
                return Err(Error::UpstreamTimeout {
                    request: request.clone(),
                });
            }
        }
        self.inner.query(query, variables).await
    }
}

#[async_trait]
impl UpstreamApi for ScriptedUpstream {
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.answer(query, variables).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn rate_limit(&self) -> Result<RateLimitSnapshot> {
        self.rate_limit_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.rate_limit().await
    }
}

/// Settings with caching on and the isocalendar unit allowed.
pub fn settings() -> AppSettings {
    let mut plugins = BTreeMap::new();
    plugins.insert(
        "isocalendar".to_string(),
        PluginSettings {
            enabled: Some(true),
            options: BTreeMap::new(),
        },
    );
    AppSettings {
        plugins,
        ..Default::default()
    }
}

/// [`settings`] with caching disabled.
pub fn uncached_settings() -> AppSettings {
    AppSettings {
        cached: Duration::ZERO,
        ..settings()
    }
}

/// Render path for `login` with extra query parameters.
pub fn render_path(login: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return format!("/{login}");
    }
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("/{login}?{}", query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_upstream_counts_calls() {
        let upstream = ScriptedUpstream::new().with_missing("ghost");
        let query = "query { account: repositoryOwner(login: $login) { login } }";

        let found = upstream.query(query, json!({"login": "octocat"})).await.unwrap();
        assert_eq!(found["account"]["login"], "octocat");
        let missing = upstream.query(query, json!({"login": "ghost"})).await.unwrap();
        assert!(missing["account"].is_null());

        assert_eq!(upstream.calls(), 2);
        assert_eq!(upstream.max_active(), 1);
    }

    #[test]
    fn test_render_path() {
        assert_eq!(render_path("octocat", &[]), "/octocat");
        assert_eq!(
            render_path("octocat", &[("isocalendar", "true"), ("cache", "500")]),
            "/octocat?isocalendar=true&cache=500"
        );
    }
}
