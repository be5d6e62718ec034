//! Mandatory base unit.
//!
//! Resolves the account, merges `config.*` request parameters over the
//! defaults and decides which template sections are rendered, in which order.

use crate::queries;
use chrono::{DateTime, Datelike, Utc};
use metrica_core::context::{Account, AccountKind, PluginContext};
use metrica_core::ports::UpstreamApi;
use metrica_core::request::parse_flag;
use metrica_core::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

pub const NAME: &str = "base";

/// Parts of the base unit that can be toggled with the `base` parameter.
pub const BASE_PARTS: &[&str] = &["header", "activity", "community", "repositories", "metadata"];

#[derive(Deserialize)]
struct AccountData {
    account: Option<AccountNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountNode {
    #[serde(rename = "__typename")]
    typename: String,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    followers: Option<TotalCount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

impl From<AccountNode> for Account {
    fn from(node: AccountNode) -> Self {
        let kind = if node.typename == "Organization" {
            AccountKind::Organization
        } else {
            AccountKind::User
        };
        Account {
            login: node.login,
            name: node.name,
            kind,
            avatar_url: node.avatar_url,
            created_at: node.created_at,
            followers: node.followers.map(|f| f.total_count).unwrap_or(0),
        }
    }
}

/// Default per-section configuration before request overrides.
pub fn default_config() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("timezone".to_string(), json!("UTC")),
        ("order".to_string(), json!("")),
        ("octicon".to_string(), json!(false)),
        ("gemoji".to_string(), json!(false)),
        ("animations".to_string(), json!(true)),
    ])
}

fn config_value(raw: &str) -> Value {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "false" | "yes" | "no" | "on" | "off" => json!(parse_flag(raw)),
        _ => json!(raw),
    }
}

/// Requested base parts; every part when the parameter is absent.
pub fn requested_parts(value: Option<&str>) -> BTreeSet<String> {
    match value {
        None => BASE_PARTS.iter().map(|p| p.to_string()).collect(),
        Some(raw) if parse_flag(raw) => BASE_PARTS.iter().map(|p| p.to_string()).collect(),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|p| BASE_PARTS.contains(p))
            .map(str::to_string)
            .collect(),
    }
}

/// Ordered enabled sections.
///
/// Sections named by `order` come first, then the remaining template sections
/// in template order. Sections that are not enabled are dropped.
pub fn order_sections(
    template: &[String],
    enabled: &BTreeSet<String>,
    order: &str,
) -> Vec<String> {
    let preferred = order.split(',').map(str::trim).filter(|s| !s.is_empty());
    let mut sections: Vec<String> = Vec::new();
    for name in preferred.chain(template.iter().map(String::as_str)) {
        let known = template.iter().any(|s| s == name);
        if known && enabled.contains(name) && !sections.iter().any(|s| s == name) {
            sections.push(name.to_string());
        }
    }
    sections
}

/// Resolves account and layout before any feature unit runs.
#[derive(Debug, Default)]
pub struct BasePlugin;

impl BasePlugin {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        ctx: &mut PluginContext,
        upstream: &dyn UpstreamApi,
        template_sections: &[String],
        plugin_sections: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let login = ctx.login.as_str().to_string();
        debug!(login = %login, "Resolving account");

        let data = upstream
            .query(queries::ACCOUNT, json!({ "login": login }))
            .await?;
        let data: AccountData = serde_json::from_value(data)?;
        let account: Account = data.account.ok_or(Error::NotFound)?.into();
        let account = Arc::new(account);
        ctx.account = Some(Arc::clone(&account));

        let mut config = default_config();
        for (key, value) in ctx.query.scoped("config") {
            config.insert(key, config_value(&value));
        }
        ctx.config = config;

        let parts = requested_parts(ctx.query.get(NAME));
        let mut enabled: BTreeSet<String> =
            parts.iter().map(|p| format!("{NAME}.{p}")).collect();
        enabled.extend(plugin_sections.iter().cloned());

        let order = ctx
            .config_value("order")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        for section in order_sections(template_sections, &enabled, &order) {
            ctx.sections.insert(section);
        }

        let registered_years = account
            .created_at
            .map(|created| years_between(created, now))
            .unwrap_or(0);

        let result = json!({
            "account": &*account,
            "repository": ctx.repository,
            "parts": parts,
        });
        ctx.set_plugin_result(NAME, Arc::new(result));
        ctx.set_computed(
            "base.registration",
            Arc::new(json!({ "years": registered_years })),
        );
        debug!(login = %login, kind = %account.kind, sections = ctx.sections.len(), "Account resolved");
        Ok(())
    }
}

fn years_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use metrica_core::ratelimit::RateLimitSnapshot;
    use metrica_core::{Login, QueryParams};
    use pretty_assertions::assert_eq;

    struct StaticAccount(Value);

    #[async_trait]
    impl UpstreamApi for StaticAccount {
        async fn query(&self, _query: &str, _variables: Value) -> Result<Value> {
            Ok(self.0.clone())
        }

        async fn rate_limit(&self) -> Result<RateLimitSnapshot> {
            Ok(RateLimitSnapshot::default())
        }
    }

    fn template() -> Vec<String> {
        vec!["base.header".into(), "isocalendar".into(), "base.metadata".into()]
    }

    fn context(pairs: &[(&str, &str)]) -> PluginContext {
        let query: QueryParams = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PluginContext::new(Login::parse("octocat").unwrap(), query, "classic")
    }

    fn user() -> StaticAccount {
        StaticAccount(json!({
            "account": {
                "__typename": "User",
                "login": "octocat",
                "name": "The Octocat",
                "avatarUrl": null,
                "createdAt": "2011-01-25T18:44:36Z",
                "followers": {"totalCount": 42}
            }
        }))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_order_sections() {
        let enabled: BTreeSet<String> = ["base.header", "isocalendar", "base.metadata"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            order_sections(&template(), &enabled, "isocalendar, unknown, isocalendar"),
            vec!["isocalendar", "base.header", "base.metadata"]
        );

        let only_header: BTreeSet<String> = ["base.header".to_string()].into();
        assert_eq!(order_sections(&template(), &only_header, ""), vec!["base.header"]);
    }

    #[test]
    fn test_requested_parts() {
        assert_eq!(requested_parts(None).len(), BASE_PARTS.len());
        assert_eq!(requested_parts(Some("true")).len(), BASE_PARTS.len());
        assert_eq!(
            requested_parts(Some("header,bogus")),
            BTreeSet::from(["header".to_string()])
        );
        assert!(requested_parts(Some("false")).is_empty());
    }

    #[tokio::test]
    async fn test_resolves_account_config_and_sections() {
        let mut ctx = context(&[("config.octicon", "true"), ("config.order", "isocalendar")]);
        let plugins = BTreeSet::from(["isocalendar".to_string()]);
        BasePlugin::new()
            .run(&mut ctx, &user(), &template(), &plugins, now())
            .await
            .unwrap();

        let account = ctx.account.as_ref().unwrap();
        assert_eq!(account.kind, AccountKind::User);
        assert_eq!(account.followers, 42);
        assert_eq!(ctx.config_value("octicon"), Some(&json!(true)));
        assert_eq!(ctx.config_value("timezone"), Some(&json!("UTC")));
        assert_eq!(
            ctx.sections.iter().cloned().collect::<Vec<_>>(),
            vec!["isocalendar", "base.header", "base.metadata"]
        );
        assert_eq!(
            ctx.computed()["base.registration"].as_ref(),
            &json!({"years": 13})
        );
        assert!(ctx.plugin_result(NAME).is_some());
    }

    #[tokio::test]
    async fn test_disabled_plugin_section_is_dropped() {
        let mut ctx = context(&[("base", "header")]);
        BasePlugin::new()
            .run(&mut ctx, &user(), &template(), &BTreeSet::new(), now())
            .await
            .unwrap();
        assert_eq!(ctx.sections.iter().cloned().collect::<Vec<_>>(), vec!["base.header"]);
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let mut ctx = context(&[]);
        let err = BasePlugin::new()
            .run(
                &mut ctx,
                &StaticAccount(json!({"account": null})),
                &template(),
                &BTreeSet::new(),
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert!(ctx.account.is_none());
    }

    #[tokio::test]
    async fn test_organization_kind() {
        let mut ctx = context(&[]);
        let upstream = StaticAccount(json!({
            "account": {"__typename": "Organization", "login": "github", "name": "GitHub", "avatarUrl": null, "createdAt": null}
        }));
        BasePlugin::new()
            .run(&mut ctx, &upstream, &template(), &BTreeSet::new(), now())
            .await
            .unwrap();
        assert_eq!(ctx.account.as_ref().unwrap().kind, AccountKind::Organization);
    }
}
