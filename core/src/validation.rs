//! Local validation of form input, run before any request is made.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::normalize::ActionError;

/// Field name to rejection messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

// Already field-addressable; no reshaping.
impl From<ValidationErrors> for ActionError {
    fn from(errors: ValidationErrors) -> Self {
        errors
            .0
            .into_iter()
            .flat_map(|(field, messages)| messages.into_iter().map(move |m| (field.clone(), m)))
            .collect()
    }
}

/// Outcome of validating one form submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    Accepted(T),
    Rejected(ValidationErrors),
}

impl<T> Submission<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }

    pub fn into_result(self) -> Result<T, ValidationErrors> {
        match self {
            Submission::Accepted(value) => Ok(value),
            Submission::Rejected(errors) => Err(errors),
        }
    }
}

// `{ ok, value? , error? }`
impl<T: Serialize> Serialize for Submission<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Submission", 2)?;
        match self {
            Submission::Accepted(value) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("value", value)?;
            }
            Submission::Rejected(errors) => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", errors)?;
            }
        }
        state.end()
    }
}

/// Collects per-field messages while checking form input.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `valid` holds.
    pub fn check(&mut self, field: &str, valid: bool, message: &str) -> &mut Self {
        if !valid {
            self.errors.add(field, message);
        }
        self
    }

    /// Reject blank (empty or whitespace-only) input.
    pub fn require(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        self.check(field, !value.trim().is_empty(), message)
    }

    pub fn finish<T>(self, value: T) -> Submission<T> {
        if self.errors.is_empty() {
            Submission::Accepted(value)
        } else {
            Submission::Rejected(self.errors)
        }
    }
}
