//! Recognition of provider-side failures.

use metrica_core::Error;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static TIMEOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)this may be the result of a timeout, or it could be a GitHub bug")
        .expect("timeout pattern is valid")
});

static REQUEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(?<request>[\w:]+)`").expect("request id pattern is valid"));

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GraphQlError {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Map the first reported error onto the domain taxonomy.
pub fn classify(errors: &[GraphQlError]) -> Error {
    let Some(first) = errors.first() else {
        return Error::Upstream("empty error list".into());
    };
    if first.kind.as_deref() == Some("NOT_FOUND") {
        return Error::NotFound;
    }
    if TIMEOUT.is_match(&first.message) {
        let request = REQUEST_ID
            .captures(&first.message)
            .and_then(|caps| caps.name("request"))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        return Error::UpstreamTimeout { request };
    }
    Error::Upstream(first.message.clone())
}
