//! Application state shared across handlers.

use dashmap::DashMap;
use metrica_cache::{RequestCoalescer, ResponseCache};
use metrica_core::output::OutputFormat;
use metrica_core::ports::UpstreamApi;
use metrica_github::RateLimitTracker;
use metrica_plugins::{PluginPipeline, PluginSettings};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]+$").expect("session pattern is valid"));

/// Per-request runtime settings.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Allowed identifiers; empty allows everyone.
    pub restricted: Vec<String>,
    /// Maximum distinct cached users; zero is unlimited.
    pub maxusers: usize,
    /// Bypasses caching and coalescing.
    pub debug: bool,
    /// Bypasses coalescing.
    pub mocked: bool,
    /// Default cache lifetime; zero disables caching.
    pub cached: Duration,
    /// Allowed output names; the first one is the default.
    pub outputs: Vec<String>,
    pub templates: Vec<String>,
    pub plugins_default: bool,
    pub plugins: BTreeMap<String, PluginSettings>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            restricted: Vec::new(),
            maxusers: 0,
            debug: false,
            mocked: false,
            cached: Duration::from_secs(30 * 60),
            outputs: vec!["auto".into(), "svg".into(), "png".into(), "json".into()],
            templates: vec!["classic".into()],
            plugins_default: false,
            plugins: BTreeMap::new(),
        }
    }
}

impl AppSettings {
    pub fn caching(&self) -> bool {
        !self.debug && !self.cached.is_zero()
    }

    pub fn coalescing(&self) -> bool {
        !self.debug && !self.mocked
    }

    /// Requested output if allowed, the default output otherwise.
    pub fn select_output(&self, requested: Option<&str>) -> OutputFormat {
        let name = requested
            .filter(|r| self.outputs.iter().any(|o| o == r))
            .or_else(|| self.outputs.first().map(String::as_str))
            .unwrap_or("auto");
        name.parse().unwrap_or(OutputFormat::Svg)
    }

    pub fn template_enabled(&self, template: &str) -> bool {
        self.templates.iter().any(|t| t == template)
    }
}

/// Application state shared across all handlers.
pub struct AppState {
    pub settings: AppSettings,
    pub pipeline: Arc<PluginPipeline>,
    pub upstream: Arc<dyn UpstreamApi>,
    pub sessions: DashMap<String, Arc<dyn UpstreamApi>>,
    pub cache: ResponseCache,
    pub coalescer: RequestCoalescer,
    pub tracker: Option<Arc<RateLimitTracker>>,
}

impl AppState {
    pub fn new(
        settings: AppSettings,
        pipeline: Arc<PluginPipeline>,
        upstream: Arc<dyn UpstreamApi>,
        tracker: Option<Arc<RateLimitTracker>>,
    ) -> Self {
        let cache = ResponseCache::new(settings.cached);
        Self {
            settings,
            pipeline,
            upstream,
            sessions: DashMap::new(),
            cache,
            coalescer: RequestCoalescer::new(),
            tracker,
        }
    }

    /// Register a caller credential under a session id.
    pub fn register_session(&self, session: impl Into<String>, upstream: Arc<dyn UpstreamApi>) {
        self.sessions.insert(session.into().to_ascii_lowercase(), upstream);
    }

    /// Upstream client for the `x-metrics-session` header value.
    pub fn upstream_for(&self, session: Option<&str>) -> Arc<dyn UpstreamApi> {
        let Some(session) = session.filter(|s| SESSION_ID.is_match(s)) else {
            return Arc::clone(&self.upstream);
        };
        let prefix = &session[..session.len().min(6)];
        match self.sessions.get(&session.to_ascii_lowercase()) {
            Some(upstream) => {
                debug!(session = %prefix, "Using session credentials");
                Arc::clone(upstream.value())
            }
            None => {
                debug!(session = %prefix, "Unknown session, using default credentials");
                Arc::clone(&self.upstream)
            }
        }
    }

    /// Flag the quota counters for a refresh.
    pub fn mark_requests_dirty(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_selection() {
        let settings = AppSettings::default();
        assert_eq!(settings.select_output(Some("png")), OutputFormat::Png);
        assert_eq!(settings.select_output(Some("pdf")), OutputFormat::Svg);
        assert_eq!(settings.select_output(None), OutputFormat::Svg);

        let settings = AppSettings {
            outputs: vec!["json".into()],
            ..Default::default()
        };
        assert_eq!(settings.select_output(Some("png")), OutputFormat::Json);
    }

    #[test]
    fn test_bypass_flags() {
        let settings = AppSettings {
            debug: true,
            ..Default::default()
        };
        assert!(!settings.caching());
        assert!(!settings.coalescing());

        let settings = AppSettings {
            mocked: true,
            ..Default::default()
        };
        assert!(settings.caching());
        assert!(!settings.coalescing());

        let settings = AppSettings {
            cached: Duration::ZERO,
            ..Default::default()
        };
        assert!(!settings.caching());
    }
}
