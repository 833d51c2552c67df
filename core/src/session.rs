//! Request-scoped credential storage.
//!
//! The surrounding web framework restores a session from the inbound cookie
//! and writes it back on the response; this crate only reads and mutates it.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Keys of the credential session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    AccessToken,
    RefreshToken,
}

impl SessionField {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionField::AccessToken => "accessToken",
            SessionField::RefreshToken => "refreshToken",
        }
    }
}

/// Read/write access to the current request's session. A missing field is
/// the unauthenticated state, never an error.
pub trait SessionAccessor: Send + Sync {
    fn get(&self, field: SessionField) -> Option<String>;
    fn set(&self, field: SessionField, value: String);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// In-memory session, shareable across the calls of one request.
#[derive(Debug, Default)]
pub struct MemorySession {
    credentials: Mutex<Credentials>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set(SessionField::AccessToken, access_token.into());
        session.set(SessionField::RefreshToken, refresh_token.into());
        session
    }

    /// Restore from a cookie value. Anything unreadable yields an empty
    /// session.
    pub fn from_cookie_value(value: &str) -> Self {
        let credentials = match serde_json::from_str::<Credentials>(value) {
            Ok(credentials) => credentials,
            Err(err) => {
                if !value.is_empty() {
                    tracing::debug!(error = %err, "discarding unreadable session cookie");
                }
                Credentials::default()
            }
        };
        Self {
            credentials: Mutex::new(credentials),
        }
    }

    /// Serialize for the outbound cookie.
    pub fn to_cookie_value(&self) -> String {
        // Two optional strings always serialize.
        serde_json::to_string(&*self.lock()).unwrap_or_default()
    }

    /// Drop both credentials.
    pub fn clear(&self) {
        *self.lock() = Credentials::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionAccessor for MemorySession {
    fn get(&self, field: SessionField) -> Option<String> {
        let credentials = self.lock();
        match field {
            SessionField::AccessToken => credentials.access_token.clone(),
            SessionField::RefreshToken => credentials.refresh_token.clone(),
        }
    }

    fn set(&self, field: SessionField, value: String) {
        let mut credentials = self.lock();
        match field {
            SessionField::AccessToken => credentials.access_token = Some(value),
            SessionField::RefreshToken => credentials.refresh_token = Some(value),
        }
    }
}
