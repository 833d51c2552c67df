//! Bearer-authenticated access to the backend with one-shot token refresh.
//!
//! # Design
//! `AuthenticatedClient` composes a plain `HttpClient` with the current
//! request's session. A logical call is at most three round-trips: the
//! original request, one refresh, one retry. The retry is never refreshed
//! again, so termination does not depend on a counter.
//!
//! Concurrent calls sharing one session refresh independently; the last
//! writer's credentials stay in the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{check_status, HttpClient};
use crate::error::ClientError;
use crate::http::{merge_headers, HttpMethod, HttpResponse, RequestOptions};
use crate::session::{SessionAccessor, SessionField};

const REFRESH_PATH: &str = "auth/refresh";
const AUTHENTICATE_PATH: &str = "auth/authenticate";
const AUTHORIZE_PATH: &str = "auth/authorize";

/// Terminal state of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// First attempt or the retry returned 2xx.
    Success,
    /// First attempt failed with a status other than 401.
    FailedOther,
    /// 401 with no refresh credential, or the refresh itself failed.
    FailedUnauthorized,
    /// The retry after a successful refresh did not return 2xx.
    FailedFinal,
}

/// Body of `POST auth/authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_permission: Option<bool>,
}

impl AuthorizeRequest {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            all_permission: None,
        }
    }

    /// Require every listed permission instead of any one of them.
    pub fn all(mut self) -> Self {
        self.all_permission = Some(true);
        self
    }
}

/// Credentials minted by `POST auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthenticatedClient {
    http: HttpClient,
    session: Arc<dyn SessionAccessor>,
}

impl AuthenticatedClient {
    pub fn new(http: HttpClient, session: Arc<dyn SessionAccessor>) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &dyn SessionAccessor {
        self.session.as_ref()
    }

    /// Send with the session's access credential, refreshing once on 401.
    /// Any response is `Ok`; see `request_traced` for the terminal state.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ClientError> {
        self.request_traced(method, path, options)
            .await
            .map(|(response, _)| response)
    }

    pub async fn request_traced(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<(HttpResponse, CallOutcome), ClientError> {
        let access_token = self.session.get(SessionField::AccessToken);
        let first = self
            .http
            .request(method, path, &with_bearer(options, access_token.as_deref()))
            .await?;

        if !first.is_unauthorized() {
            let outcome = if first.is_success() {
                CallOutcome::Success
            } else {
                CallOutcome::FailedOther
            };
            return Ok(finish(first, outcome, path));
        }

        let Some(refresh_token) = self.session.get(SessionField::RefreshToken) else {
            tracing::debug!(path, "401 without refresh credential");
            return Ok(finish(first, CallOutcome::FailedUnauthorized, path));
        };

        let Some(tokens) = self.refresh(&refresh_token).await else {
            return Ok(finish(first, CallOutcome::FailedUnauthorized, path));
        };

        self.session
            .set(SessionField::AccessToken, tokens.access_token.clone());
        self.session
            .set(SessionField::RefreshToken, tokens.refresh_token);

        let retried = self
            .http
            .request(method, path, &with_bearer(options, Some(&tokens.access_token)))
            .await?;
        let outcome = if retried.is_success() {
            CallOutcome::Success
        } else {
            CallOutcome::FailedFinal
        };
        Ok(finish(retried, outcome, path))
    }

    // Any failure here yields None; the caller keeps the original 401.
    async fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
        tracing::debug!("refreshing access credential");
        let options = RequestOptions::json(json!({ "refreshToken": refresh_token }));
        let response = match self.http.post(REFRESH_PATH, options).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed");
                return None;
            }
        };
        match response.json::<TokenPair>() {
            Ok(tokens) => Some(tokens),
            Err(err) => {
                tracing::warn!(error = %err, "token refresh returned an unreadable body");
                None
            }
        }
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

    /// `true` when the backend accepts the session's credential.
    pub async fn authenticate(&self) -> Result<bool, ClientError> {
        let response = self
            .request(HttpMethod::Post, AUTHENTICATE_PATH, &RequestOptions::new())
            .await?;
        Ok(response.is_success())
    }

    /// `true` when the session holds the requested permissions.
    pub async fn authorize(&self, request: &AuthorizeRequest) -> Result<bool, ClientError> {
        let body =
            serde_json::to_value(request).map_err(|e| ClientError::Serialization(e.to_string()))?;
        let response = self
            .request(HttpMethod::Post, AUTHORIZE_PATH, &RequestOptions::json(body))
            .await?;
        Ok(response.is_success())
    }
}

fn with_bearer(options: &RequestOptions, access_token: Option<&str>) -> RequestOptions {
    let mut options = options.clone();
    if let Some(token) = access_token {
        let bearer = [("authorization".to_string(), format!("Bearer {token}"))];
        options.headers = merge_headers(std::mem::take(&mut options.headers), &bearer);
    }
    options
}

fn finish(response: HttpResponse, outcome: CallOutcome, path: &str) -> (HttpResponse, CallOutcome) {
    tracing::debug!(path, status = response.status, ?outcome, "authenticated call finished");
    (response, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfiguration;
    use crate::error::TransportError;
    use crate::session::MemorySession;
    use crate::test_support::ScriptedTransport;

    const UNAUTHORIZED: &str =
        r#"{"type":"about:blank","title":"Unauthorized","status":401,"detail":"token expired"}"#;
    const REFRESHED: &str = r#"{"accessToken":"a-2","refreshToken":"r-2"}"#;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        session: Arc<MemorySession>,
        client: AuthenticatedClient,
    }

    fn harness(session: MemorySession) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Arc::new(session);
        let config = ClientConfiguration::new("http://hr.local", "v1").unwrap();
        let http = HttpClient::new(config, transport.clone());
        let client = AuthenticatedClient::new(http, session.clone());
        Harness {
            transport,
            session,
            client,
        }
    }

    async fn list_employees(h: &Harness) -> (HttpResponse, CallOutcome) {
        h.client
            .request_traced(HttpMethod::Get, "employees", &RequestOptions::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn valid_credential_makes_no_refresh_call() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(200, "[]");

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 200);
        assert_eq!(outcome, CallOutcome::Success);
        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://hr.local/employees/v1");
        assert_eq!(requests[0].header("Authorization"), Some("Bearer a-1"));
    }

    #[tokio::test]
    async fn expired_credential_refreshes_once_and_retries() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_response(200, REFRESHED);
        h.transport.push_response(200, r#"[{"id":1}]"#);

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.body, r#"[{"id":1}]"#);
        assert_eq!(outcome, CallOutcome::Success);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].url, "http://hr.local/auth/refresh/v1");
        assert_eq!(requests[1].method, HttpMethod::Post);
        assert_eq!(requests[1].header("authorization"), None);
        assert_eq!(
            ScriptedTransport::body_json(&requests[1]),
            json!({"refreshToken": "r-1"})
        );
        assert_eq!(requests[2].url, "http://hr.local/employees/v1");
        assert_eq!(requests[2].header("authorization"), Some("Bearer a-2"));

        assert_eq!(h.session.get(SessionField::AccessToken).as_deref(), Some("a-2"));
        assert_eq!(h.session.get(SessionField::RefreshToken).as_deref(), Some("r-2"));
    }

    #[tokio::test]
    async fn missing_refresh_credential_returns_original_401() {
        let session = MemorySession::new();
        session.set(SessionField::AccessToken, "a-1".to_string());
        let h = harness(session);
        h.transport.push_response(401, UNAUTHORIZED);

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 401);
        assert_eq!(response.body, UNAUTHORIZED);
        assert_eq!(outcome, CallOutcome::FailedUnauthorized);
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_returns_original_401_without_retry() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_response(
            400,
            r#"{"type":"about:blank","title":"Bad Request","status":400,"detail":"refresh token revoked"}"#,
        );

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.body, UNAUTHORIZED);
        assert_eq!(outcome, CallOutcome::FailedUnauthorized);
        assert_eq!(h.transport.requests().len(), 2);
        assert_eq!(h.session.get(SessionField::AccessToken).as_deref(), Some("a-1"));
        assert_eq!(h.session.get(SessionField::RefreshToken).as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn refresh_network_failure_returns_original_401() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_error(TransportError::Connect("refused".to_string()));

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 401);
        assert_eq!(outcome, CallOutcome::FailedUnauthorized);
        assert_eq!(h.transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_refresh_body_counts_as_failed_refresh() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_response(200, r#"{"accessToken":"only-one"}"#);

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 401);
        assert_eq!(outcome, CallOutcome::FailedUnauthorized);
        assert_eq!(h.transport.requests().len(), 2);
        assert_eq!(h.session.get(SessionField::AccessToken).as_deref(), Some("a-1"));
    }

    #[tokio::test]
    async fn retried_401_is_final() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_response(200, REFRESHED);
        h.transport.push_response(401, UNAUTHORIZED);
        // Would be consumed by a second refresh if one were attempted.
        h.transport.push_response(200, r#"{"accessToken":"a-3","refreshToken":"r-3"}"#);

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 401);
        assert_eq!(outcome, CallOutcome::FailedFinal);
        assert_eq!(h.transport.requests().len(), 3);
        assert_eq!(h.session.get(SessionField::AccessToken).as_deref(), Some("a-2"));
    }

    #[tokio::test]
    async fn other_failures_are_not_refreshed() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(403, "");

        let (response, outcome) = list_employees(&h).await;

        assert_eq!(response.status, 403);
        assert_eq!(outcome, CallOutcome::FailedOther);
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_session_sends_no_authorization_header() {
        let h = harness(MemorySession::new());
        h.transport.push_response(401, UNAUTHORIZED);

        let (_, outcome) = list_employees(&h).await;

        assert_eq!(outcome, CallOutcome::FailedUnauthorized);
        assert_eq!(h.transport.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn bearer_overrides_caller_authorization_header() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(204, "");

        let options = RequestOptions::new().header("Authorization", "Basic Zm9vOmJhcg==");
        h.client.delete("leaves/3", options).await.unwrap();

        let request = &h.transport.requests()[0];
        assert_eq!(request.header("authorization"), Some("Bearer a-1"));
        assert_eq!(request.headers.len(), 1);
    }

    #[tokio::test]
    async fn verb_surfaces_unrecovered_401_as_api_error() {
        let h = harness(MemorySession::new());
        h.transport.push_response(401, UNAUTHORIZED);

        let err = h.client.get("jobs", RequestOptions::new()).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn retried_request_keeps_original_body() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(401, UNAUTHORIZED);
        h.transport.push_response(200, REFRESHED);
        h.transport.push_response(201, r#"{"id":12}"#);

        let body = json!({"name": "Research"});
        let response = h
            .client
            .post("departments", RequestOptions::json(body.clone()))
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        let requests = h.transport.requests();
        assert_eq!(ScriptedTransport::body_json(&requests[0]), body);
        assert_eq!(ScriptedTransport::body_json(&requests[2]), body);
        assert_eq!(requests[2].header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn authenticate_maps_status_to_bool() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(204, "");
        h.transport.push_response(403, "");

        assert!(h.client.authenticate().await.unwrap());
        assert!(!h.client.authenticate().await.unwrap());
        assert_eq!(h.transport.requests()[0].url, "http://hr.local/auth/authenticate/v1");
    }

    #[tokio::test]
    async fn authenticate_propagates_network_failure() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_error(TransportError::Timeout);

        let err = h.client.authenticate().await.unwrap_err();
        assert_eq!(err, ClientError::Network(TransportError::Timeout));
    }

    #[tokio::test]
    async fn authorize_posts_permissions() {
        let h = harness(MemorySession::with_tokens("a-1", "r-1"));
        h.transport.push_response(200, "");
        h.transport.push_response(200, "");

        let any = AuthorizeRequest::new(["employees.read"]);
        let all = AuthorizeRequest::new(["employees.read", "employees.write"]).all();
        assert!(h.client.authorize(&any).await.unwrap());
        assert!(h.client.authorize(&all).await.unwrap());

        let requests = h.transport.requests();
        assert_eq!(requests[0].url, "http://hr.local/auth/authorize/v1");
        assert_eq!(
            ScriptedTransport::body_json(&requests[0]),
            json!({"permissions": ["employees.read"]})
        );
        assert_eq!(
            ScriptedTransport::body_json(&requests[1]),
            json!({"permissions": ["employees.read", "employees.write"], "allPermission": true})
        );
    }
}
