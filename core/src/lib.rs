//! Authenticated API access layer for the HR administration backend.
//!
//! # Overview
//! Composes versioned requests against the backend, attaches the session's
//! bearer credential, rotates an expired credential once per call, and
//! normalizes every failure into field-addressable form messages.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest` / `HttpResponse`);
//!   a `Transport` performs the round-trip, so everything above it is
//!   deterministic and testable with a scripted transport.
//! - `HttpClient` is stateless beyond its configuration. `AuthenticatedClient`
//!   composes it with the request's `SessionAccessor`.
//! - `ClientCell` is an explicit, write-once slot passed to request handling
//!   instead of a process-wide static.
//! - Backend failures stay values (`ClientError`) until `to_action_errors`
//!   turns them into an `ActionError` for the form.

pub mod action;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod problem;
pub mod session;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use action::{fail, ok, unauthorized, ActionResult, NoData};
pub use auth::{AuthenticatedClient, AuthorizeRequest, CallOutcome, TokenPair};
pub use client::HttpClient;
pub use config::{ClientCell, ClientConfiguration};
pub use error::{ApiError, ClientError, ConfigurationError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, RequestOptions, WireBody};
pub use normalize::{to_action_errors, ActionError, Failure};
pub use problem::{FieldError, ProblemDetails};
pub use session::{MemorySession, SessionAccessor, SessionField};
pub use transport::{ReqwestTransport, Transport};
pub use validation::{Submission, ValidationErrors, Validator};
