//! Metrics rendering handlers.

use crate::error::ApiError;
use crate::middleware::SESSION_HEADER;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use metrica_core::output::Artifact;
use metrica_core::{Error, Login, QueryParams, RequestKey, Result};
use metrica_plugins::{RenderJob, resolve_descriptors};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_TEMPLATE: &str = "classic";

/// Render metrics for an account.
pub async fn render_account(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    render(state, login, None, query, headers).await
}

/// Render metrics for one repository of an account.
pub async fn render_repository(
    State(state): State<Arc<AppState>>,
    Path((login, repository)): Path<(String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    render(state, login, Some(repository), query, headers).await
}

async fn render(
    state: Arc<AppState>,
    login: String,
    repository: Option<String>,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
) -> Response {
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok());
    let result = serve(&state, &login, repository, QueryParams::new(query), session).await;
    state.mark_requests_dirty();

    match result {
        Ok(artifact) => {
            let mime = HeaderValue::from_str(&artifact.mime)
                .unwrap_or(HeaderValue::from_static("application/octet-stream"));
            ([(header::CONTENT_TYPE, mime)], artifact.body).into_response()
        }
        Err(err) => {
            debug!(login = %login, error = %err, "Render request rejected");
            ApiError(err).into_response()
        }
    }
}

/// Admit, look up and, on a miss, compute one render request.
async fn serve(
    state: &AppState,
    raw_login: &str,
    repository: Option<String>,
    query: QueryParams,
    session: Option<&str>,
) -> Result<Artifact> {
    let settings = &state.settings;
    let login = Login::parse(raw_login)?;
    login.ensure_allowed(&settings.restricted)?;

    let key = RequestKey::new(&login, repository.as_deref(), &query);
    // Held until this function returns, whatever the outcome.
    let admission = if settings.coalescing() {
        Some(state.coalescer.admit(&key).await)
    } else {
        None
    };
    if admission.as_ref().is_some_and(|a| a.already_pending) {
        debug!(key = %key, "Pending request settled, checking cache");
    }

    if settings.caching() {
        if let Some(artifact) = state.cache.get(&key) {
            debug!(key = %key, "Serving cached metrics");
            return Ok(artifact);
        }
    }

    if settings.maxusers > 0 && state.cache.len() + 1 > settings.maxusers {
        warn!(login = %login, maxusers = settings.maxusers, "Maximum number of users reached");
        return Err(Error::Capacity);
    }

    let template = query.get("template").unwrap_or(DEFAULT_TEMPLATE).to_string();
    if !settings.template_enabled(&template) {
        return Err(Error::UnsupportedTemplate(template));
    }
    let output = settings.select_output(query.get("config.output"));
    let die_on_error = query.flag("plugins.errors.fatal").unwrap_or(false);
    let ttl = query
        .number("cache")
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_millis(ms as u64));
    let (descriptors, warnings) = resolve_descriptors(
        state.pipeline.plugins(),
        &settings.plugins,
        settings.plugins_default,
        &query,
    );

    let job = RenderJob {
        login: login.clone(),
        repository,
        query,
        template: template.clone(),
        output,
        die_on_error,
        upstream: state.upstream_for(session),
        descriptors,
        warnings,
        now: Utc::now(),
    };

    let started = Instant::now();
    let rendered = state.pipeline.run(job).await?;
    let errors = rendered.errors.len();
    let artifact = rendered.into_artifact()?;
    info!(
        login = %login,
        template = %template,
        output = %output,
        errors,
        bytes = artifact.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rendered metrics"
    );

    if settings.caching() {
        state.cache.put(key, artifact.clone(), ttl);
    }
    drop(admission);

    Ok(artifact)
}
