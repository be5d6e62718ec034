//! Mapping of domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrica_core::Error;
use tracing::error;

/// A domain error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidIdentifier(_) | Error::UnsupportedTemplate(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::UnsupportedOutput(_) => StatusCode::NOT_ACCEPTABLE,
            Error::Capacity => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable plain-text message clients can classify on.
    pub fn message(&self) -> String {
        match &self.0 {
            Error::InvalidIdentifier(_) => "Bad request: username seems invalid".into(),
            Error::Forbidden(_) => "Forbidden: username not in allowed list".into(),
            Error::NotFound => "Not found: unknown user or organization".into(),
            Error::UnsupportedTemplate(_) => "Bad request: unsupported template".into(),
            Error::UnsupportedOutput(_) => {
                "Not Acceptable: unsupported output format or account type for specified parameters"
                    .into()
            }
            Error::UpstreamTimeout { request } => format!(
                "Internal Server Error: failed to execute request {request} (this may be the result of a timeout, or it could be a GitHub bug)"
            ),
            Error::Capacity => {
                "Service Unavailable: maximum number of users reached, only cached metrics are available"
                    .into()
            }
            _ => "Internal Server Error: failed to process metrics correctly".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self.0, category = ?self.0.category(), "Request failed");
        }
        (status, self.message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_input_statuses() {
        let cases = [
            (Error::InvalidIdentifier(".x".into()), StatusCode::BAD_REQUEST),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::UnsupportedTemplate("x".into()), StatusCode::BAD_REQUEST),
            (Error::UnsupportedOutput("organization (png)".into()), StatusCode::NOT_ACCEPTABLE),
            (Error::Capacity, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_timeout_message_carries_request_id() {
        let err = ApiError(Error::UpstreamTimeout {
            request: "AB12:3456".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("failed to execute request AB12:3456"));
    }

    #[test]
    fn test_other_failures_are_generic() {
        for err in [
            Error::Fatal { errors: 2 },
            Error::Upstream("boom".into()),
            Error::Render("bad svg".into()),
        ] {
            let err = ApiError(err);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                err.message(),
                "Internal Server Error: failed to process metrics correctly"
            );
        }
    }
}
