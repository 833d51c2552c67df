//! Collapses every kind of failure into field-addressable form messages.
//!
//! # Design
//! Forms only understand `ActionError`: a map from input name (or the
//! page-level keys `form` / `root`) to messages. Every backend or local
//! failure goes through `to_action_errors` before it is shown, so raw
//! payloads never reach the user.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ClientError};
use crate::problem::ProblemDetails;
use crate::validation::ValidationErrors;

/// Page-level key for form-wide messages.
pub const FORM_KEY: &str = "form";
/// Page-level key for messages about the page itself.
pub const ROOT_KEY: &str = "root";
/// Shown when a failure carries nothing we can interpret.
pub const FALLBACK_MESSAGE: &str = "Unable to process request";

/// Field name to messages. Lists are never empty and keep encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionError(BTreeMap<String, Vec<String>>);

impl ActionError {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single form-level message.
    pub fn form(message: impl Into<String>) -> Self {
        Self::new().with(FORM_KEY, message)
    }

    /// A single root-level message.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new().with(ROOT_KEY, message)
    }

    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(field, message);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether `key` is rendered as a page alert rather than next to an input.
    pub fn is_page_level(key: &str) -> bool {
        key == FORM_KEY || key == ROOT_KEY
    }

    /// Messages for page alerts, `form` before `root`.
    pub fn page_messages(&self) -> impl Iterator<Item = &str> {
        [FORM_KEY, ROOT_KEY]
            .into_iter()
            .filter_map(|key| self.0.get(key))
            .flatten()
            .map(String::as_str)
    }

    /// Entries that belong to individual inputs.
    pub fn field_entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.iter().filter(|(k, _)| !Self::is_page_level(k))
    }
}

impl FromIterator<(String, String)> for ActionError {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, message) in iter {
            errors.push(field, message);
        }
        errors
    }
}

/// Everything that can be normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// A non-2xx backend response.
    Api(ApiError),
    /// Local rejection before any request was made.
    Validation(ValidationErrors),
    /// An error object with a type name and a message.
    Generic { name: String, message: String },
    /// A payload of unknown shape.
    Unknown(serde_json::Value),
}

impl Failure {
    pub fn generic(name: impl Into<String>, message: impl Into<String>) -> Self {
        Failure::Generic {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error under the generic name `Error`.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::generic("Error", err.to_string())
    }
}

impl From<ApiError> for Failure {
    fn from(err: ApiError) -> Self {
        Failure::Api(err)
    }
}

impl From<ValidationErrors> for Failure {
    fn from(errors: ValidationErrors) -> Self {
        Failure::Validation(errors)
    }
}

impl From<serde_json::Value> for Failure {
    fn from(value: serde_json::Value) -> Self {
        Failure::Unknown(value)
    }
}

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api(api) => Failure::Api(api),
            ClientError::Network(err) => Failure::generic("NetworkError", err.to_string()),
            ClientError::Serialization(msg) => Failure::generic("SerializationError", msg),
            ClientError::Deserialization(msg) => Failure::generic("DeserializationError", msg),
        }
    }
}

/// Map any failure onto form messages.
pub fn to_action_errors(failure: impl Into<Failure>) -> ActionError {
    match failure.into() {
        Failure::Api(err) => match err.problem {
            Some(problem) => from_problem(&problem),
            None => {
                tracing::debug!(status = err.status, "API error without problem details");
                ActionError::form(FALLBACK_MESSAGE)
            }
        },
        Failure::Validation(errors) => errors.into(),
        Failure::Generic { name, message } => ActionError::form(format!("{name}: {message}")),
        Failure::Unknown(value) => match ProblemDetails::from_value(&value) {
            Some(problem) => from_problem(&problem),
            None => ActionError::form(FALLBACK_MESSAGE),
        },
    }
}

fn from_problem(problem: &ProblemDetails) -> ActionError {
    match problem.field_errors() {
        Some(errors) => errors
            .iter()
            .map(|e| (e.name.clone(), e.message().to_string()))
            .collect(),
        None => ActionError::form(problem.summary()),
    }
}
