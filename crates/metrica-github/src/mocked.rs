//! Deterministic offline upstream, used in sandbox and mocked modes.
//!
//! Answers are derived from a hash of the request, so identical requests
//! always get identical data and no network access is needed.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use metrica_core::ports::UpstreamApi;
use metrica_core::ratelimit::{RateLimitBudget, RateLimitSnapshot};
use metrica_core::{Error, Result};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Offline stand-in for the GitHub API.
#[derive(Debug, Clone, Default)]
pub struct MockedUpstream;

impl MockedUpstream {
    pub fn new() -> Self {
        Self
    }

    fn account(&self, login: &str) -> Value {
        let followers = seed(login.as_bytes()) % 2_000;
        if login.ends_with("-org") {
            json!({"account": {
                "__typename": "Organization",
                "login": login,
                "name": login.trim_end_matches("-org"),
                "avatarUrl": null,
                "createdAt": "2012-04-01T00:00:00Z"
            }})
        } else {
            json!({"account": {
                "__typename": "User",
                "login": login,
                "name": login,
                "avatarUrl": null,
                "createdAt": "2011-01-25T18:44:36Z",
                "followers": {"totalCount": followers}
            }})
        }
    }

    fn calendar(&self, login: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Value {
        let mut weeks: Vec<Value> = Vec::new();
        let mut days: Vec<Value> = Vec::new();
        let mut date = from.date_naive();
        let last = to.date_naive();

        while date <= last {
            if date.weekday() == Weekday::Sun && !days.is_empty() {
                weeks.push(json!({ "contributionDays": std::mem::take(&mut days) }));
            }
            let mut key = login.as_bytes().to_vec();
            key.extend_from_slice(date.to_string().as_bytes());
            let count = match seed(&key) % 10 {
                0..=2 => 0,
                n => n - 2,
            };
            days.push(json!({
                "date": date.to_string(),
                "contributionCount": count,
                "color": color(count),
            }));
            date += Duration::days(1);
        }
        if !days.is_empty() {
            weeks.push(json!({ "contributionDays": days }));
        }

        json!({"user": {"calendar": {"contributionCalendar": {"weeks": weeks}}}})
    }
}

fn seed(bytes: &[u8]) -> u64 {
    let hash = Sha256::digest(bytes);
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(first)
}

fn color(count: u64) -> &'static str {
    match count {
        0 => "#ebedf0",
        1..=2 => "#9be9a8",
        3..=4 => "#40c463",
        5..=6 => "#30a14e",
        _ => "#216e39",
    }
}

fn instant(variables: &Value, name: &str) -> Result<DateTime<Utc>> {
    variables[name]
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Upstream(format!("missing or invalid variable {name}")))
}

fn budget(limit: u64) -> RateLimitBudget {
    RateLimitBudget {
        limit,
        used: 0,
        remaining: limit,
        reset: None,
    }
}

#[async_trait]
impl UpstreamApi for MockedUpstream {
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let login = variables["login"].as_str().unwrap_or_default();
        debug!(login = %login, "Answering mocked query");

        if query.contains("contributionsCollection") {
            let from = instant(&variables, "from")?;
            let to = instant(&variables, "to")?;
            return Ok(self.calendar(login, from, to));
        }
        if query.contains("repositoryOwner") {
            return Ok(self.account(login));
        }
        Err(Error::Upstream("unsupported mocked query".into()))
    }

    async fn rate_limit(&self) -> Result<RateLimitSnapshot> {
        Ok(RateLimitSnapshot {
            core: budget(5_000),
            graphql: budget(5_000),
            search: budget(30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALENDAR_QUERY: &str = "query { user { contributionsCollection { x } } }";

    #[tokio::test]
    async fn test_account_is_deterministic() {
        let upstream = MockedUpstream::new();
        let query = "query { repositoryOwner(login: $login) { login } }";
        let a = upstream.query(query, json!({"login": "octocat"})).await.unwrap();
        let b = upstream.query(query, json!({"login": "octocat"})).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a["account"]["__typename"], "User");

        let org = upstream.query(query, json!({"login": "github-org"})).await.unwrap();
        assert_eq!(org["account"]["__typename"], "Organization");
    }

    #[tokio::test]
    async fn test_calendar_covers_inclusive_range() {
        let upstream = MockedUpstream::new();
        let data = upstream
            .query(
                CALENDAR_QUERY,
                json!({
                    "login": "octocat",
                    "from": "2024-01-07T00:00:00Z",
                    "to": "2024-02-03T23:59:59.999Z",
                }),
            )
            .await
            .unwrap();

        let weeks = data["user"]["calendar"]["contributionCalendar"]["weeks"]
            .as_array()
            .unwrap();
        let days: usize = weeks
            .iter()
            .map(|w| w["contributionDays"].as_array().unwrap().len())
            .sum();
        assert_eq!(weeks.len(), 4);
        assert_eq!(days, 28);
    }

    #[tokio::test]
    async fn test_invalid_variables_fail() {
        let err = MockedUpstream::new()
            .query(CALENDAR_QUERY, json!({"login": "octocat"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
