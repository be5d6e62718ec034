//! Request identity: validated account identifiers, query parameters and
//! the deterministic key identifying one logical rendering job.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static LOGIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-A-Za-z0-9_]+$").expect("login pattern is a valid regex")
});

/// A validated account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Login(String);

impl Login {
    /// Validate a raw identifier taken from the request path.
    ///
    /// Line breaks are stripped first. Identifiers starting with `.` or
    /// containing `/` are rejected, as is anything outside `[-A-Za-z0-9_]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let login: String = raw.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();
        if login.starts_with('.') || login.contains('/') {
            return Err(Error::InvalidIdentifier(login));
        }
        if !LOGIN_PATTERN.is_match(&login) {
            return Err(Error::InvalidIdentifier(login));
        }
        Ok(Self(login))
    }

    /// Check the identifier against an allow-list. An empty list allows everyone.
    pub fn ensure_allowed(&self, restricted: &[String]) -> Result<()> {
        if restricted.is_empty() || restricted.iter().any(|allowed| allowed == &self.0) {
            Ok(())
        } else {
            Err(Error::Forbidden(self.0.clone()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query parameters of a render request, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self(params)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Interpret a parameter as a boolean flag.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(parse_flag)
    }

    /// Interpret a parameter as a boolean flag, defaulting to `false`.
    pub fn enabled(&self, name: &str) -> bool {
        self.flag(name).unwrap_or(false)
    }

    /// Interpret a parameter as a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.trim().parse::<f64>().ok())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Parameters whose name starts with `<prefix>.`, with the prefix removed.
    pub fn scoped(&self, prefix: &str) -> BTreeMap<String, String> {
        let dotted = format!("{prefix}.");
        self.0
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&dotted).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Canonical `a=1&b=2` form, stable for identical parameter sets.
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a textual flag the way query strings are usually written.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Deterministic identity of one logical rendering job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    login: String,
    digest: String,
}

impl RequestKey {
    /// Derive the key from the request path components and its query.
    pub fn new(login: &Login, repository: Option<&str>, query: &QueryParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(login.as_str().as_bytes());
        hasher.update(b"/");
        if let Some(repository) = repository {
            hasher.update(repository.as_bytes());
        }
        hasher.update(b"?");
        hasher.update(query.canonical().as_bytes());
        let hash = hasher.finalize();

        Self {
            login: login.as_str().to_string(),
            digest: hex::encode(&hash[..8]),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.login, self.digest)
    }
}
