//! Error types for Metrica.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Client input errors
    #[error("Bad request: username seems invalid ({0})")]
    InvalidIdentifier(String),

    #[error("Forbidden: username not in allowed list ({0})")]
    Forbidden(String),

    #[error("user not found")]
    NotFound,

    #[error("unsupported template: {0}")]
    UnsupportedTemplate(String),

    #[error("not supported for: {0}")]
    UnsupportedOutput(String),

    // Upstream errors
    #[error(
        "failed to execute request {request} (this may be the result of a timeout, or it could be a GitHub bug)"
    )]
    UpstreamTimeout { request: String },

    #[error("Upstream error: {0}")]
    Upstream(String),

    // Capacity errors
    #[error("maximum number of users reached")]
    Capacity,

    // Pipeline errors
    #[error("An error occurred during rendering, dying ({errors} errors)")]
    Fatal { errors: usize },

    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    // Infrastructure errors
    #[error("Render error: {0}")]
    Render(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ClientInput,
    Upstream,
    Capacity,
    Internal,
}

impl Error {
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidIdentifier(_)
            | Error::Forbidden(_)
            | Error::NotFound
            | Error::UnsupportedTemplate(_)
            | Error::UnsupportedOutput(_) => ErrorCategory::ClientInput,
            Error::UpstreamTimeout { .. } | Error::Upstream(_) | Error::Network(_) => {
                ErrorCategory::Upstream
            }
            Error::Capacity => ErrorCategory::Capacity,
            _ => ErrorCategory::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
