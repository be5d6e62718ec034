//! Server configuration.

use anyhow::Context;
use metrica_api::AppSettings;
use metrica_core::output::OptimizeTarget;
use metrica_github::client::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL};
use metrica_github::ratelimit::{DEFAULT_DEBOUNCE, DEFAULT_REFRESH};
use metrica_plugins::{PipelineSettings, PluginSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variables holding the default token, in lookup order.
pub const TOKEN_VARIABLES: [&str; 2] = ["METRICA_TOKEN", "GITHUB_TOKEN"];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Provider token; read from the environment when absent.
    #[serde(default)]
    pub token: Option<String>,
    /// Run without a token and without quota tracking.
    #[serde(default)]
    pub notoken: bool,
    /// Maximum distinct cached users, zero for no limit.
    #[serde(default)]
    pub maxusers: usize,
    /// Allowed accounts, empty for everyone.
    #[serde(default)]
    pub restricted: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    /// Default cache lifetime in milliseconds, zero disables caching.
    #[serde(default = "default_cached")]
    pub cached: u64,
    /// Answer from the deterministic offline upstream.
    #[serde(default)]
    pub mocked: bool,
    #[serde(default)]
    pub optimize: Optimize,
    #[serde(default = "default_padding")]
    pub padding: String,
    /// Allowed outputs, the first one is the default.
    #[serde(default = "default_outputs")]
    pub outputs: Vec<String>,
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
    /// Allow every plugin not configured otherwise.
    #[serde(default)]
    pub plugins_default: bool,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginSettings>,
    #[serde(default)]
    pub extras: ExtrasConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ratelimit: RateLimitConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Session id (hex) to token, selected with `x-metrics-session`.
    #[serde(default)]
    pub sessions: BTreeMap<String, String>,
}

/// Optimization passes: all, none, or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Optimize {
    Toggle(bool),
    Targets(Vec<OptimizeTarget>),
}

impl Default for Optimize {
    fn default() -> Self {
        Optimize::Toggle(false)
    }
}

impl Optimize {
    pub fn targets(&self) -> Vec<OptimizeTarget> {
        match self {
            Optimize::Toggle(true) => OptimizeTarget::ALL.to_vec(),
            Optimize::Toggle(false) => Vec::new(),
            Optimize::Targets(targets) => targets.clone(),
        }
    }
}

/// Whether requests may inject custom CSS or JS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtrasConfig {
    #[serde(default)]
    pub css: bool,
    #[serde(default)]
    pub js: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_graphql")]
    pub graphql: String,
    #[serde(default = "default_rest")]
    pub rest: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            graphql: default_graphql(),
            rest: default_rest(),
        }
    }
}

/// Quota tracker timers, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cached() -> u64 {
    30 * 60 * 1000
}

fn default_padding() -> String {
    "0,8".to_string()
}

fn default_outputs() -> Vec<String> {
    ["auto", "svg", "png", "json"].map(String::from).to_vec()
}

fn default_templates() -> Vec<String> {
    vec!["classic".to_string()]
}

fn default_graphql() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}

fn default_rest() -> String {
    DEFAULT_REST_URL.to_string()
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH.as_secs()
}

fn default_debounce_secs() -> u64 {
    DEFAULT_DEBOUNCE.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: None,
            notoken: false,
            maxusers: 0,
            restricted: Vec::new(),
            debug: false,
            cached: default_cached(),
            mocked: false,
            optimize: Optimize::default(),
            padding: default_padding(),
            outputs: default_outputs(),
            templates: default_templates(),
            plugins_default: false,
            plugins: BTreeMap::new(),
            extras: ExtrasConfig::default(),
            api: ApiConfig::default(),
            ratelimit: RateLimitConfig::default(),
            log: LogConfig::default(),
            sessions: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ratelimit.refresh_secs == 0 {
            anyhow::bail!("ratelimit.refresh_secs must be at least 1");
        }
        if self.ratelimit.debounce_secs == 0 {
            anyhow::bail!("ratelimit.debounce_secs must be at least 1");
        }
        Ok(())
    }

    /// Fill in the token from the environment if the file has none.
    pub fn resolve_token(&mut self) {
        self.resolve_token_with(|name| std::env::var(name).ok());
    }

    fn resolve_token_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.token.as_deref().is_some_and(|t| !t.is_empty()) {
            return;
        }
        self.token = TOKEN_VARIABLES
            .iter()
            .find_map(|name| lookup(name).filter(|t| !t.is_empty()));
    }

    /// Offline mode: mocked data, every optimization, no cache, every plugin.
    pub fn apply_sandbox(&mut self) {
        self.mocked = true;
        self.optimize = Optimize::Toggle(true);
        self.cached = 0;
        self.plugins_default = true;
    }

    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            restricted: self.restricted.clone(),
            maxusers: self.maxusers,
            debug: self.debug,
            mocked: self.mocked,
            cached: Duration::from_millis(self.cached),
            outputs: self.outputs.clone(),
            templates: self.templates.clone(),
            plugins_default: self.plugins_default,
            plugins: self.plugins.clone(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            optimize: self.optimize.targets(),
            padding: Some(self.padding.clone()).filter(|p| !p.trim().is_empty()),
            extras_css: self.extras.css,
            extras_js: self.extras.js,
        }
    }
}
