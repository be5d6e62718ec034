//! Plugin units and the rendering pipeline for Metrica.
//!
//! A job runs the mandatory [`base::BasePlugin`] first, then every enabled
//! feature unit against the same [`PluginContext`]. Feature units either write
//! additive fields or enqueue deferred tasks; the [`pipeline::PluginPipeline`]
//! awaits those tasks, collects failures and drives rendering.

pub mod base;
pub mod isocalendar;
pub mod pipeline;
pub mod queries;
pub mod serialize;

pub use base::BasePlugin;
pub use isocalendar::{IsocalendarPlugin, WindowedAggregator};
pub use pipeline::{PipelineOutput, PipelineSettings, PluginPipeline, RenderJob, Rendered};
pub use serialize::ContextSerializer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrica_core::Result;
use metrica_core::QueryParams;
use metrica_core::context::{PluginContext, PluginDescriptor};
use metrica_core::ports::UpstreamApi;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Top-level query parameters that never name a plugin.
const RESERVED_PARAMETERS: &[&str] = &["template", "cache", "verify", "base", "user"];

/// Everything a unit may use besides the shared context.
#[derive(Clone)]
pub struct PluginEnv {
    pub upstream: Arc<dyn UpstreamApi>,
    pub descriptor: PluginDescriptor,
    pub now: DateTime<Utc>,
}

/// Trait for feature units.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get the plugin name.
    fn name(&self) -> &str;

    /// Template sections this unit fills when enabled.
    fn sections(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }

    /// Contribute to the context, directly or through deferred tasks.
    ///
    /// An error returned here is recorded for this unit and does not stop
    /// the other units.
    async fn run(&self, ctx: &mut PluginContext, env: &PluginEnv) -> Result<()>;
}

/// Instance-level configuration of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Get every builtin feature unit.
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(IsocalendarPlugin::new())]
}

/// Get a builtin feature unit by name.
pub fn get_builtin_plugin(name: &str) -> Option<Arc<dyn Plugin>> {
    match name {
        "isocalendar" => Some(Arc::new(IsocalendarPlugin::new())),
        _ => None,
    }
}

/// Build per-request descriptors for `plugins`.
///
/// A unit is enabled when the instance allows it and the request asks for it.
/// Request options (`<name>.<option>`) override instance options. Requests for
/// units that are unknown or disabled on this instance produce warnings.
pub fn resolve_descriptors(
    plugins: &[Arc<dyn Plugin>],
    settings: &BTreeMap<String, PluginSettings>,
    plugins_default: bool,
    query: &QueryParams,
) -> (Vec<PluginDescriptor>, Vec<String>) {
    let mut descriptors = Vec::with_capacity(plugins.len());
    let mut warnings = Vec::new();

    for plugin in plugins {
        let name = plugin.name();
        let instance = settings.get(name);
        let allowed = instance
            .and_then(|s| s.enabled)
            .unwrap_or(plugins_default);
        let requested = query.enabled(name);

        if requested && !allowed {
            warnings.push(format!("plugin {} is disabled on this instance", name));
        }

        let mut descriptor = PluginDescriptor::new(name, requested && allowed);
        if let Some(instance) = instance {
            descriptor.options.extend(instance.options.clone());
        }
        descriptor.options.extend(query.scoped(name));
        descriptors.push(descriptor);
    }

    for (key, value) in query.iter() {
        if key.contains('.') || RESERVED_PARAMETERS.contains(&key.as_str()) {
            continue;
        }
        let known = plugins.iter().any(|p| p.name() == key);
        if !known && metrica_core::request::parse_flag(value) {
            warnings.push(format!("unknown plugin {}", key));
        }
    }

    (descriptors, warnings)
}
