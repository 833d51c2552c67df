//! HTTP transport types for the backend API.
//!
//! # Design
//! Requests and responses are plain data. The client core composes
//! `HttpRequest` values and interprets `HttpResponse` values; a `Transport`
//! executes the round-trip in between. Composition stays deterministic and
//! every layer above the transport can be tested without a socket.

use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Body supplied by a caller.
///
/// `Json` values are serialized by the client and tagged
/// `application/json`. `Binary` payloads (multipart forms, uploads) are
/// forwarded untouched; the caller owns their `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

/// Encoded body as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireBody {
    Text(String),
    Bytes(Vec<u8>),
}

/// Per-call options accepted by every verb helper.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<RequestBody>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self {
            body: Some(RequestBody::Json(body)),
            ..Self::default()
        }
    }

    pub fn binary(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            body: Some(RequestBody::Binary(bytes)),
            headers: vec![("content-type".to_string(), content_type.into())],
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<WireBody>,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|e| ClientError::Deserialization(e.to_string()))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Overlay `overrides` onto `base`. A name present in both keeps the
/// override's value; names compare case-insensitively and the override's
/// spelling wins.
pub fn merge_headers(
    base: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = base
        .into_iter()
        .filter(|(k, _)| !overrides.iter().any(|(o, _)| o.eq_ignore_ascii_case(k)))
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}
