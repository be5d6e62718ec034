//! Shared accumulator threaded through the plugin units of one job.
//!
//! Units only ever add to the context: they append to the error, warning and
//! script lists, insert into sections, or write result slots keyed by their own
//! name. Deferred tasks are `'static` futures; their results are merged back
//! into the context by the orchestrating pipeline once every task has settled.

use crate::request::{Login, QueryParams};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A result slot value; the same slot may be referenced from several places.
pub type Shared = Arc<Value>;

/// Kind of account resolved by the base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Organization,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::User => f.write_str("user"),
            AccountKind::Organization => f.write_str("organization"),
        }
    }
}

/// Account information resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub login: String,
    pub name: Option<String>,
    pub kind: AccountKind,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followers: u64,
}

impl Account {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.login)
    }
}

/// Named, independently enableable unit with its per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// A failure recorded by a unit, either directly or through a deferred task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFailure {
    pub plugin: String,
    pub message: String,
}

impl PluginFailure {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Settled record of a deferred task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Result(Value),
    Error(PluginFailure),
}

/// Deferred asynchronous work enqueued by a unit.
pub struct DeferredTask {
    pub plugin: String,
    pub future: BoxFuture<'static, TaskOutcome>,
}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask")
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered collection without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedSet(Vec<String>);

impl OrderedSet {
    /// Insert a value unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OrderedSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = OrderedSet::default();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// User supplied style and script additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extras {
    pub css: String,
    pub js: String,
}

/// Shared accumulator for one rendering job.
#[derive(Debug)]
pub struct PluginContext {
    pub login: Login,
    pub repository: Option<String>,
    pub query: QueryParams,
    pub template: String,
    pub account: Option<Arc<Account>>,
    pub config: BTreeMap<String, Value>,
    pub sections: OrderedSet,
    pub extras: Extras,
    errors: Vec<PluginFailure>,
    warnings: Vec<String>,
    plugins: BTreeMap<String, Shared>,
    computed: BTreeMap<String, Shared>,
    postscripts: Vec<String>,
    tasks: Vec<DeferredTask>,
}

impl PluginContext {
    pub fn new(login: Login, query: QueryParams, template: impl Into<String>) -> Self {
        Self {
            login,
            repository: None,
            query,
            template: template.into(),
            account: None,
            config: BTreeMap::new(),
            sections: OrderedSet::default(),
            extras: Extras::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            plugins: BTreeMap::new(),
            computed: BTreeMap::new(),
            postscripts: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn push_error(&mut self, failure: PluginFailure) {
        self.errors.push(failure);
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_postscript(&mut self, script: impl Into<String>) {
        self.postscripts.push(script.into());
    }

    /// Write the result slot owned by `plugin`.
    pub fn set_plugin_result(&mut self, plugin: impl Into<String>, value: Shared) {
        self.plugins.insert(plugin.into(), value);
    }

    /// Write a computed value. Keys are expected to be namespaced by unit.
    pub fn set_computed(&mut self, key: impl Into<String>, value: Shared) {
        self.computed.insert(key.into(), value);
    }

    /// Enqueue a deferred task on behalf of `plugin`.
    pub fn defer<F>(&mut self, plugin: impl Into<String>, future: F)
    where
        F: std::future::Future<Output = TaskOutcome> + Send + 'static,
    {
        self.tasks.push(DeferredTask {
            plugin: plugin.into(),
            future: Box::pin(future),
        });
    }

    /// Hand over every enqueued task to the caller.
    pub fn take_tasks(&mut self) -> Vec<DeferredTask> {
        std::mem::take(&mut self.tasks)
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn errors(&self) -> &[PluginFailure] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn postscripts(&self) -> &[String] {
        &self.postscripts
    }

    pub fn plugins(&self) -> &BTreeMap<String, Shared> {
        &self.plugins
    }

    pub fn plugin_result(&self, plugin: &str) -> Option<&Shared> {
        self.plugins.get(plugin)
    }

    pub fn computed(&self) -> &BTreeMap<String, Shared> {
        &self.computed
    }

    /// Merged per-section configuration value.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> PluginContext {
        PluginContext::new(
            Login::parse("octocat").unwrap(),
            QueryParams::default(),
            "classic",
        )
    }

    #[test]
    fn test_ordered_set_keeps_first_position() {
        let mut set: OrderedSet = ["b", "a"].into_iter().collect();
        assert!(!set.insert("b"));
        assert!(set.insert("c"));
        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_containers_only_grow() {
        let mut ctx = context();
        ctx.push_error(PluginFailure::new("a", "boom"));
        ctx.push_warning("careful");
        ctx.push_postscript("console.log(1)");
        ctx.set_plugin_result("a", Arc::new(json!({"ok": true})));
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.postscripts().len(), 1);
        assert!(ctx.plugin_result("a").is_some());
    }

    #[tokio::test]
    async fn test_deferred_tasks_are_handed_over() {
        let mut ctx = context();
        ctx.defer("a", async { TaskOutcome::Result(json!(1)) });
        ctx.defer("b", async { TaskOutcome::Error(PluginFailure::new("b", "nope")) });
        assert_eq!(ctx.pending_tasks(), 2);

        let tasks = ctx.take_tasks();
        assert_eq!(ctx.pending_tasks(), 0);
        let outcomes = futures::future::join_all(tasks.into_iter().map(|t| t.future)).await;
        assert_eq!(outcomes[0], TaskOutcome::Result(json!(1)));
        assert!(matches!(outcomes[1], TaskOutcome::Error(_)));
    }
}
