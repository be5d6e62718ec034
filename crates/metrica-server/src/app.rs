//! Application assembly from configuration.

use crate::config::ServerConfig;
use metrica_api::AppState;
use metrica_core::ports::UpstreamApi;
use metrica_github::{GitHubClient, MockedUpstream, RateLimitTracker};
use metrica_plugins::{PluginPipeline, builtin_plugins};
use metrica_render::builtin_templates;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared state plus the background tracker, if any.
pub struct Application {
    pub state: Arc<AppState>,
    pub tracker: Option<Arc<RateLimitTracker>>,
}

fn upstream(config: &ServerConfig, token: Option<String>) -> anyhow::Result<Arc<dyn UpstreamApi>> {
    if config.mocked {
        return Ok(Arc::new(MockedUpstream::new()));
    }
    let client = GitHubClient::with_endpoints(token, &config.api.graphql, &config.api.rest)?;
    Ok(Arc::new(client))
}

/// Wire upstream, pipeline, sessions and tracker together.
pub fn build(config: &ServerConfig) -> anyhow::Result<Application> {
    let token = if config.notoken { None } else { config.token.clone() };
    if token.is_none() && !config.mocked && !config.notoken {
        warn!("No token configured, requests will be unauthenticated");
    }
    let default_upstream = upstream(config, token)?;

    let pipeline = PluginPipeline::new(
        builtin_plugins(),
        builtin_templates(),
        config.pipeline_settings(),
    );
    for template in &config.templates {
        if pipeline.template(template).is_none() {
            warn!(template = %template, "Enabled template is not available");
        }
    }

    let tracker = (!config.notoken).then(|| {
        Arc::new(RateLimitTracker::with_intervals(
            Arc::clone(&default_upstream),
            Duration::from_secs(config.ratelimit.refresh_secs),
            Duration::from_secs(config.ratelimit.debounce_secs),
        ))
    });

    let state = AppState::new(
        config.app_settings(),
        Arc::new(pipeline),
        default_upstream,
        tracker.clone(),
    );
    for (session, token) in &config.sessions {
        state.register_session(session.clone(), upstream(config, Some(token.clone()))?);
    }

    info!(
        mocked = config.mocked,
        debug = config.debug,
        cached_ms = config.cached,
        maxusers = config.maxusers,
        sessions = config.sessions.len(),
        plugins = ?state.pipeline.plugins().iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
        "Application configured"
    );

    Ok(Application {
        state: Arc::new(state),
        tracker,
    })
}
