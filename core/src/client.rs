//! Request composition for the backend HR API.
//!
//! # Design
//! `HttpClient` holds the configuration and a shared `Transport`; it carries
//! no per-request state and is cheap to clone. `build_request` produces an
//! `HttpRequest` without touching the network, `send` hands it to the
//! transport, and the verb helpers turn non-2xx responses into `ApiError`.

use std::fmt;
use std::sync::Arc;

use url::form_urlencoded;

use crate::config::ClientConfiguration;
use crate::error::{ApiError, ClientError, TransportError};
use crate::http::{
    merge_headers, HttpMethod, HttpRequest, HttpResponse, RequestBody, RequestOptions, WireBody,
};
use crate::transport::Transport;

/// Unauthenticated client for the backend API.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<ClientConfiguration>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(config: ClientConfiguration, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// `{base}/{path}/{version}`, with leading and trailing `/` stripped
    /// from `path`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url(),
            path.trim_matches('/'),
            self.config.version()
        )
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ClientError> {
        let mut url = self.url(path);
        if !options.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(options.query.iter())
                .finish();
            url.push('?');
            url.push_str(&query);
        }

        let (headers, body) = match &options.body {
            Some(RequestBody::Json(value)) => {
                let text = serde_json::to_string(value)
                    .map_err(|e| ClientError::Serialization(e.to_string()))?;
                let defaults = vec![("content-type".to_string(), "application/json".to_string())];
                (merge_headers(defaults, &options.headers), Some(WireBody::Text(text)))
            }
            Some(RequestBody::Binary(bytes)) => {
                (options.headers.clone(), Some(WireBody::Bytes(bytes.clone())))
            }
            None => (options.headers.clone(), None),
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Execute a composed request. Every response is `Ok`, whatever its
    /// status.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let result = self.transport.execute(request).await;
        match &result {
            Ok(response) => tracing::debug!(status = response.status, "response received"),
            Err(err) => tracing::warn!(error = %err, "request failed"),
        }
        result
    }

    /// Compose and send. Non-2xx statuses are returned as responses.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ClientError> {
        let request = self.build_request(method, path, options)?;
        Ok(self.send(request).await?)
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<HttpResponse, ClientError> {
        check_status(self.request(HttpMethod::Get, path, &options).await?)
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<HttpResponse, ClientError> {
        check_status(self.request(HttpMethod::Post, path, &options).await?)
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<HttpResponse, ClientError> {
        check_status(self.request(HttpMethod::Put, path, &options).await?)
    }

    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<HttpResponse, ClientError> {
        check_status(self.request(HttpMethod::Patch, path, &options).await?)
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<HttpResponse, ClientError> {
        check_status(self.request(HttpMethod::Delete, path, &options).await?)
    }
}

/// Map non-2xx responses to `ApiError`.
pub(crate) fn check_status(response: HttpResponse) -> Result<HttpResponse, ClientError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::from_response(response.status, response.body).into())
}
