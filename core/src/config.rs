//! Client configuration and the write-once client slot.
//!
//! # Design
//! There is no hidden global. A `ClientCell` is created once at process start
//! and handed to request handling explicitly; it accepts configuration until
//! the first `instance` call builds the client, and is frozen afterwards.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use url::Url;

use crate::client::HttpClient;
use crate::error::ConfigurationError;
use crate::transport::Transport;

const BASE_URL_VAR: &str = "HR_API_BASE_URL";
const VERSION_VAR: &str = "HR_API_VERSION";
const DEFAULT_VERSION: &str = "v1";

/// Backend address and API version appended to every resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    base_url: String,
    version: String,
}

impl ClientConfiguration {
    pub fn new(
        base_url: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let base_url = base_url.into();
        let version = version.into();

        if let Err(e) = Url::parse(&base_url) {
            return Err(ConfigurationError::InvalidBaseUrl {
                url: base_url,
                reason: e.to_string(),
            });
        }
        let version = version.trim_matches('/').to_string();
        if version.is_empty() {
            return Err(ConfigurationError::EmptyVersion);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            version,
        })
    }

    /// Read `HR_API_BASE_URL` and `HR_API_VERSION` (default `v1`), loading a
    /// local `.env` first when one exists.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        // Missing .env is fine.
        let _ = dotenvy::dotenv();
        let base_url =
            std::env::var(BASE_URL_VAR).map_err(|_| ConfigurationError::MissingVar(BASE_URL_VAR))?;
        let version = std::env::var(VERSION_VAR).unwrap_or_else(|_| DEFAULT_VERSION.to_string());
        Self::new(base_url, version)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Holds the pending configuration and, once built, the shared client.
pub struct ClientCell {
    transport: Arc<dyn Transport>,
    pending: Mutex<Option<ClientConfiguration>>,
    client: OnceLock<HttpClient>,
}

impl ClientCell {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            pending: Mutex::new(None),
            client: OnceLock::new(),
        }
    }

    /// Replace the pending configuration. Ignored once the client exists.
    pub fn configure(&self, config: ClientConfiguration) {
        if self.client.get().is_some() {
            tracing::debug!("client already built; configuration ignored");
            return;
        }
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(config);
    }

    /// Return the client, building it on first use.
    pub fn instance(&self) -> Result<&HttpClient, ConfigurationError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let config = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConfigurationError::NotConfigured)?;
        Ok(self.client.get_or_init(|| {
            tracing::debug!(base_url = %config.base_url, version = %config.version, "API client built");
            HttpClient::new(config, Arc::clone(&self.transport))
        }))
    }
}
