//! HTTP client for the GitHub GraphQL and REST APIs.

use crate::errors::{GraphQlError, classify};
use async_trait::async_trait;
use metrica_core::ports::UpstreamApi;
use metrica_core::ratelimit::RateLimitSnapshot;
use metrica_core::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const DEFAULT_REST_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("metrica/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateLimitSnapshot,
}

/// Authenticated GitHub client.
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    graphql_url: Url,
    rest_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_endpoints(token, DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL)
    }

    /// Client talking to custom endpoints, e.g. GitHub Enterprise.
    pub fn with_endpoints(token: Option<String>, graphql_url: &str, rest_url: &str) -> Result<Self> {
        let graphql_url = Url::parse(graphql_url)
            .map_err(|e| Error::Internal(format!("invalid graphql url {graphql_url}: {e}")))?;
        let rest_url = Url::parse(rest_url)
            .map_err(|e| Error::Internal(format!("invalid rest url {rest_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            graphql_url,
            rest_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    fn rate_limit_url(&self) -> Result<Url> {
        let base = self.rest_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/rate_limit"))
            .map_err(|e| Error::Internal(format!("invalid rate limit url: {e}")))
    }
}

#[async_trait]
impl UpstreamApi for GitHubClient {
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        debug!(url = %self.graphql_url, "Sending GraphQL query");

        let response = self
            .authorize(self.client.post(self.graphql_url.clone()))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let parsed: Option<GraphQlResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(payload) if !payload.errors.is_empty() => Err(classify(&payload.errors)),
            Some(payload) if status.is_success() => Ok(payload.data.unwrap_or(Value::Null)),
            _ => Err(Error::Upstream(format!("GitHub returned {status}: {body}"))),
        }
    }

    async fn rate_limit(&self) -> Result<RateLimitSnapshot> {
        let url = self.rate_limit_url()?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("GitHub returned {status}: {body}")));
        }

        let payload: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(payload.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::with_endpoints(
            Some("secret".into()),
            &format!("{}/graphql", server.uri()),
            &server.uri(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("Authorization", "token secret"))
            .and(body_partial_json(json!({"variables": {"login": "octocat"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"account": {"login": "octocat"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data = client(&server)
            .await
            .query("query { x }", json!({"login": "octocat"}))
            .await
            .unwrap();
        assert_eq!(data["account"]["login"], "octocat");
    }

    #[tokio::test]
    async fn test_not_found_is_recognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"user": null},
                "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a User with the login of 'ghost'."}]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .query("query { x }", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn test_timeout_is_recognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "Something went wrong while executing your query. This may be the result of a timeout, or it could be a GitHub bug. Please include `AB12:3456` when reporting this issue."}]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .query("query { x }", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamTimeout { ref request } if request == "AB12:3456"));
    }

    #[tokio::test]
    async fn test_http_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .query("query { x }", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(ref message) if message.contains("502")));
    }

    #[tokio::test]
    async fn test_rate_limit_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {
                    "core": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000},
                    "graphql": {"limit": 5000, "used": 100, "remaining": 4900, "reset": 1700000000},
                    "search": {"limit": 30, "used": 0, "remaining": 30, "reset": 1700000000}
                },
                "rate": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000}
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server).await.rate_limit().await.unwrap();
        assert_eq!(snapshot.core.remaining, 4990);
        assert_eq!(snapshot.graphql.used, 100);
        assert_eq!(snapshot.search.limit, 30);
    }
}
