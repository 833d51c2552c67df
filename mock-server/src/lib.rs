use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Password accepted by `POST /auth/login` for any email.
pub const DEMO_PASSWORD: &str = "secret";

/// Permissions every session holds.
pub const GRANTED_PERMISSIONS: &[&str] = &["employees.read", "employees.write", "leaves.read"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployee {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub permissions: Vec<String>,
    #[serde(default)]
    pub all_permission: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Problem Details body sent with every non-2xx reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// In-memory backend state.
#[derive(Default)]
pub struct Backend {
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    employees: BTreeMap<u64, Employee>,
    next_id: u64,
    refresh_calls: usize,
}

impl Backend {
    pub fn issue_tokens(&mut self) -> TokenPair {
        let pair = TokenPair {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
        };
        self.access_tokens.insert(pair.access_token.clone());
        self.refresh_tokens.insert(pair.refresh_token.clone());
        pair
    }

    /// Invalidate every access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    /// Number of `POST /auth/refresh` calls received, successful or not.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls
    }

    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| self.access_tokens.contains(token))
    }
}

pub type Db = Arc<RwLock<Backend>>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/auth/login/{version}", post(login))
        .route("/auth/refresh/{version}", post(refresh))
        .route("/auth/authenticate/{version}", post(authenticate))
        .route("/auth/authorize/{version}", post(authorize))
        .route("/employees/{version}", get(list_employees).post(create_employee))
        .route("/employees/{id}/{version}", delete(delete_employee))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, Db::default()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn problem(status: StatusCode, detail: Option<String>, errors: Option<Vec<FieldError>>) -> Response {
    let body = Problem {
        kind: "about:blank".to_string(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        detail,
        trace_id: Some(Uuid::new_v4().to_string()),
        errors,
    };
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        Json(body),
    )
        .into_response()
}

fn unauthorized() -> Response {
    problem(
        StatusCode::UNAUTHORIZED,
        Some("access token is missing or expired".to_string()),
        None,
    )
}

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Response {
    if input.password != DEMO_PASSWORD {
        tracing::debug!(email = %input.email, "login rejected");
        return problem(
            StatusCode::UNAUTHORIZED,
            Some("invalid email or password".to_string()),
            None,
        );
    }
    let pair = db.write().await.issue_tokens();
    tracing::info!(email = %input.email, "login");
    Json(pair).into_response()
}

async fn refresh(State(db): State<Db>, Json(input): Json<RefreshRequest>) -> Response {
    let mut backend = db.write().await;
    backend.refresh_calls += 1;
    if !backend.refresh_tokens.remove(&input.refresh_token) {
        tracing::debug!("unknown refresh token");
        return problem(
            StatusCode::UNAUTHORIZED,
            Some("refresh token is invalid".to_string()),
            None,
        );
    }
    tracing::info!("credentials rotated");
    Json(backend.issue_tokens()).into_response()
}

async fn authenticate(State(db): State<Db>, headers: HeaderMap) -> Response {
    if !db.read().await.is_authenticated(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn authorize(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<AuthorizeRequest>,
) -> Response {
    if !db.read().await.is_authenticated(&headers) {
        return unauthorized();
    }
    let granted = |p: &String| GRANTED_PERMISSIONS.contains(&p.as_str());
    let allowed = if input.permissions.is_empty() {
        true
    } else if input.all_permission {
        input.permissions.iter().all(granted)
    } else {
        input.permissions.iter().any(granted)
    };
    if !allowed {
        return problem(
            StatusCode::FORBIDDEN,
            Some("missing required permission".to_string()),
            None,
        );
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_employees(State(db): State<Db>, headers: HeaderMap) -> Response {
    let backend = db.read().await;
    if !backend.is_authenticated(&headers) {
        return unauthorized();
    }
    let employees: Vec<Employee> = backend.employees.values().cloned().collect();
    Json(employees).into_response()
}

fn validate_employee(input: &CreateEmployee) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if input.first_name.trim().is_empty() {
        errors.push(FieldError {
            name: "firstName".to_string(),
            reason: "is required".to_string(),
            code: None,
        });
    }
    if input.last_name.trim().is_empty() {
        errors.push(FieldError {
            name: "lastName".to_string(),
            reason: "is required".to_string(),
            code: None,
        });
    }
    if !input.email.contains('@') {
        errors.push(FieldError {
            name: "email".to_string(),
            reason: "must be a valid email address".to_string(),
            code: Some("email_invalid".to_string()),
        });
    }
    errors
}

async fn create_employee(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateEmployee>,
) -> Response {
    let mut backend = db.write().await;
    if !backend.is_authenticated(&headers) {
        return unauthorized();
    }
    let errors = validate_employee(&input);
    if !errors.is_empty() {
        return problem(
            StatusCode::UNPROCESSABLE_ENTITY,
            Some("one or more fields are invalid".to_string()),
            Some(errors),
        );
    }
    if backend.employees.values().any(|e| e.email == input.email) {
        return problem(
            StatusCode::CONFLICT,
            Some(format!("an employee with email {} already exists", input.email)),
            None,
        );
    }

    backend.next_id += 1;
    let employee = Employee {
        id: backend.next_id,
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
    };
    backend.employees.insert(employee.id, employee.clone());
    (StatusCode::CREATED, Json(employee)).into_response()
}

async fn delete_employee(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, _version)): Path<(u64, String)>,
) -> Response {
    let mut backend = db.write().await;
    if !backend.is_authenticated(&headers) {
        return unauthorized();
    }
    match backend.employees.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => problem(
            StatusCode::NOT_FOUND,
            Some(format!("no employee with id {id}")),
            None,
        ),
    }
}
