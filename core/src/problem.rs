//! Problem Details payloads returned by the backend on non-2xx responses.

use serde::{Deserialize, Serialize};

/// Structured error body: `{ type, title, status, detail?, instance?,
/// traceId?, errors? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// One per-field failure inside `ProblemDetails::errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub name: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProblemDetails {
    /// Parse a response body. Returns `None` unless the body is a JSON
    /// object carrying at least `type`, `title` and `status`.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Structural check of an already-decoded payload.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Field errors, treating an empty list the same as an absent one.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        self.errors.as_deref().filter(|errors| !errors.is_empty())
    }

    /// The message shown when no field errors are present.
    pub fn summary(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.title)
    }
}

impl FieldError {
    /// Machine-readable `code` when present, otherwise the `reason`.
    pub fn message(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.reason)
    }
}
