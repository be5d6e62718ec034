//! Isometric commit calendar.

pub mod aggregator;

pub use aggregator::{CalendarDuration, CalendarReport, WindowedAggregator};

use crate::{Plugin, PluginEnv};
use async_trait::async_trait;
use metrica_core::context::{AccountKind, PluginContext, PluginFailure, TaskOutcome};
use metrica_core::{Error, Result};
use tracing::debug;

pub const NAME: &str = "isocalendar";

/// Calendar statistics over the last half-year or full year.
#[derive(Debug, Default)]
pub struct IsocalendarPlugin;

impl IsocalendarPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for IsocalendarPlugin {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, ctx: &mut PluginContext, env: &PluginEnv) -> Result<()> {
        if let Some(account) = &ctx.account
            && account.kind == AccountKind::Organization
        {
            return Err(Error::plugin(NAME, "Not supported for: organization"));
        }

        let duration = CalendarDuration::parse(env.descriptor.option("duration"));
        let aggregator = WindowedAggregator::new(env.upstream.clone());
        let login = ctx.login.as_str().to_string();
        let now = env.now;
        debug!(login = %login, duration = duration.as_str(), "Queueing calendar computation");

        ctx.defer(NAME, async move {
            match aggregator.compute(&login, duration, now).await {
                Ok(report) => match serde_json::to_value(&report) {
                    Ok(value) => TaskOutcome::Result(value),
                    Err(err) => TaskOutcome::Error(PluginFailure::new(NAME, err.to_string())),
                },
                Err(err) => TaskOutcome::Error(PluginFailure::new(NAME, err.to_string())),
            }
        });
        Ok(())
    }
}
