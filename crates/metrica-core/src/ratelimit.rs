//! Provider quota counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota counters for one category of provider calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBudget {
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    /// When the provider resets the budget.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub reset: Option<DateTime<Utc>>,
}

/// Independent budgets for the three categories the provider reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// REST budget; the provider calls it `core`.
    #[serde(rename = "rest", alias = "core")]
    pub core: RateLimitBudget,
    pub graphql: RateLimitBudget,
    pub search: RateLimitBudget,
}
