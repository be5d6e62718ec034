//! Rendering pipeline.
//!
//! The base unit runs first and alone. Feature units then run one after the
//! other against the shared context, and the deferred tasks they enqueue are
//! awaited together. A failing unit or task is recorded in the context and
//! never stops its siblings; a job asking to die on error only fails once
//! every task has settled.

use crate::base::BasePlugin;
use crate::serialize::ContextSerializer;
use crate::{Plugin, PluginEnv};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrica_core::context::{PluginContext, PluginDescriptor, PluginFailure, TaskOutcome};
use metrica_core::output::{Artifact, GlyphKind, OptimizeTarget, OutputFormat};
use metrica_core::ports::{ConvertRequest, TemplateEngine, UpstreamApi};
use metrica_core::{Error, Login, QueryParams, Result};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Instance-wide post-processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    pub optimize: Vec<OptimizeTarget>,
    /// Default `"<w>,<h>"` padding, overridden by `config.padding`.
    pub padding: Option<String>,
    pub extras_css: bool,
    pub extras_js: bool,
}

/// One rendering job.
pub struct RenderJob {
    pub login: Login,
    pub repository: Option<String>,
    pub query: QueryParams,
    pub template: String,
    pub output: OutputFormat,
    pub die_on_error: bool,
    pub upstream: Arc<dyn UpstreamApi>,
    pub descriptors: Vec<PluginDescriptor>,
    pub warnings: Vec<String>,
    pub now: DateTime<Utc>,
}

/// What a job produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Document(Artifact),
    Data(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub rendered: Rendered,
    pub errors: Vec<PluginFailure>,
    pub warnings: Vec<String>,
}

impl PipelineOutput {
    /// Bytes and MIME type to send back, whatever was produced.
    pub fn into_artifact(self) -> Result<Artifact> {
        match self.rendered {
            Rendered::Document(artifact) => Ok(artifact),
            Rendered::Data(value) => Ok(Artifact::new(
                serde_json::to_vec_pretty(&value)?,
                OutputFormat::Json.mime(),
            )),
        }
    }
}

/// Runs plugin units and drives the template collaborator.
pub struct PluginPipeline {
    base: BasePlugin,
    plugins: Vec<Arc<dyn Plugin>>,
    templates: BTreeMap<String, Arc<dyn TemplateEngine>>,
    settings: PipelineSettings,
}

impl PluginPipeline {
    pub fn new(
        plugins: Vec<Arc<dyn Plugin>>,
        templates: Vec<Arc<dyn TemplateEngine>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            base: BasePlugin::new(),
            plugins,
            templates: templates
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
            settings,
        }
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn template(&self, name: &str) -> Option<&Arc<dyn TemplateEngine>> {
        self.templates.get(name)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run(&self, job: RenderJob) -> Result<PipelineOutput> {
        let template = self
            .template(&job.template)
            .cloned()
            .ok_or_else(|| Error::UnsupportedTemplate(job.template.clone()))?;

        let mut ctx = PluginContext::new(job.login, job.query, job.template)
            .with_repository(job.repository);
        if self.settings.extras_css {
            ctx.extras.css = ctx.query.get("extras.css").unwrap_or_default().to_string();
        }
        if self.settings.extras_js {
            ctx.extras.js = ctx.query.get("extras.js").unwrap_or_default().to_string();
        }
        for warning in job.warnings {
            ctx.push_warning(warning);
        }

        let enabled: Vec<(Arc<dyn Plugin>, PluginDescriptor)> = job
            .descriptors
            .into_iter()
            .filter(|d| d.enabled)
            .filter_map(|d| {
                self.plugins
                    .iter()
                    .find(|p| p.name() == d.name)
                    .map(|p| (Arc::clone(p), d))
            })
            .collect();
        let plugin_sections: BTreeSet<String> =
            enabled.iter().flat_map(|(p, _)| p.sections()).collect();

        self.base
            .run(
                &mut ctx,
                job.upstream.as_ref(),
                &template.sections(),
                &plugin_sections,
                job.now,
            )
            .await?;

        if let Some(account) = &ctx.account
            && !template.supports(account.kind, job.output)
        {
            return Err(Error::UnsupportedOutput(format!(
                "{} ({})",
                account.kind, job.output
            )));
        }

        for (plugin, descriptor) in enabled {
            let name = descriptor.name.clone();
            let env = PluginEnv {
                upstream: Arc::clone(&job.upstream),
                descriptor,
                now: job.now,
            };
            debug!(plugin = %name, "Running plugin");
            if let Err(err) = plugin.run(&mut ctx, &env).await {
                warn!(plugin = %name, error = %err, "Plugin failed");
                ctx.push_error(failure(&name, err));
            }
        }

        let tasks = ctx.take_tasks();
        debug!(tasks = tasks.len(), "Awaiting deferred tasks");
        let outcomes = join_all(
            tasks
                .into_iter()
                .map(|task| async move { (task.plugin, task.future.await) }),
        )
        .await;
        for (plugin, outcome) in outcomes {
            match outcome {
                TaskOutcome::Result(value) => ctx.set_plugin_result(plugin, Arc::new(value)),
                TaskOutcome::Error(failure) => {
                    warn!(plugin = %plugin, error = %failure.message, "Deferred task failed");
                    ctx.set_plugin_result(
                        plugin,
                        Arc::new(json!({ "error": { "message": failure.message } })),
                    );
                    ctx.push_error(failure);
                }
            }
        }

        if job.die_on_error && !ctx.errors().is_empty() {
            return Err(Error::Fatal {
                errors: ctx.errors().len(),
            });
        }

        let errors = ctx.errors().to_vec();
        let warnings = ctx.warnings().to_vec();

        if job.output == OutputFormat::Json {
            let data = ContextSerializer::new().serialize(&ctx)?;
            return Ok(PipelineOutput {
                rendered: Rendered::Data(data),
                errors,
                warnings,
            });
        }

        let artifact = self.render(template.as_ref(), &ctx, job.output)?;
        info!(
            login = %ctx.login,
            template = %ctx.template,
            bytes = artifact.len(),
            errors = errors.len(),
            "Rendered document"
        );
        Ok(PipelineOutput {
            rendered: Rendered::Document(artifact),
            errors,
            warnings,
        })
    }

    fn render(
        &self,
        template: &dyn TemplateEngine,
        ctx: &PluginContext,
        format: OutputFormat,
    ) -> Result<Artifact> {
        let mut document = template.render(ctx)?;

        if config_flag(ctx, "octicon") {
            document = template.inline_glyphs(document, GlyphKind::Octicon)?;
        }
        if config_flag(ctx, "gemoji") {
            document = template.inline_glyphs(document, GlyphKind::Emoji)?;
        }
        if !self.settings.optimize.is_empty() {
            document = template.optimize(document, &self.settings.optimize)?;
        }

        let padding = ctx
            .config_value("padding")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.settings.padding.clone());
        let mut scripts = ctx.postscripts().to_vec();
        if !ctx.extras.js.is_empty() {
            scripts.push(ctx.extras.js.clone());
        }

        template.convert(
            document,
            &ConvertRequest {
                format,
                padding,
                scripts,
            },
        )
    }
}

fn config_flag(ctx: &PluginContext, key: &str) -> bool {
    ctx.config_value(key)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn failure(plugin: &str, err: Error) -> PluginFailure {
    match err {
        Error::Plugin { plugin, message } => PluginFailure::new(plugin, message),
        other => PluginFailure::new(plugin, other.to_string()),
    }
}
