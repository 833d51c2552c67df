//! Error types for the backend API client.
//!
//! # Design
//! `ConfigurationError` is a deployment defect and is never normalized for
//! display. Everything that can go wrong while talking to the backend is
//! captured as a `ClientError` value at the client boundary; the normalizer
//! turns those into form messages.

use thiserror::Error;

use crate::problem::ProblemDetails;

/// The client was used without a usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("API client used before it was configured")]
    NotConfigured,

    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("API version must not be empty")]
    EmptyVersion,
}

/// The HTTP round-trip itself could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

/// A non-2xx response from the backend.
///
/// `problem` is `None` when the body did not match the Problem Details
/// contract; the raw body is kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("HTTP {status}: {}", summary(.problem.as_ref(), .body))]
pub struct ApiError {
    pub status: u16,
    pub problem: Option<ProblemDetails>,
    pub body: String,
}

impl ApiError {
    /// Build from a failed response, parsing the body when it is a
    /// Problem Details document.
    pub fn from_response(status: u16, body: String) -> Self {
        let problem = ProblemDetails::parse(&body);
        Self {
            status,
            problem,
            body,
        }
    }
}

fn summary<'a>(problem: Option<&'a ProblemDetails>, body: &'a str) -> &'a str {
    match problem {
        Some(p) => p.detail.as_deref().unwrap_or(&p.title),
        None => body,
    }
}

/// Errors returned by the HTTP and authenticated clients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error(transparent)]
    Api(ApiError),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        ClientError::Api(err)
    }
}

impl ClientError {
    /// HTTP status of an API failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(err) => Some(err.status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_parses_problem_body() {
        let err = ApiError::from_response(
            404,
            r#"{"type":"about:blank","title":"Not Found","status":404,"detail":"No employee 7"}"#
                .to_string(),
        );
        assert_eq!(err.problem.as_ref().map(|p| p.status), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: No employee 7");
    }

    #[test]
    fn api_error_keeps_raw_body_when_unparseable() {
        let err = ApiError::from_response(502, "bad gateway".to_string());
        assert!(err.problem.is_none());
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }

    #[test]
    fn client_error_status_only_for_api_failures() {
        let api: ClientError = ApiError::from_response(409, String::new()).into();
        assert_eq!(api.status(), Some(409));
        assert_eq!(ClientError::from(TransportError::Timeout).status(), None);
    }
}
