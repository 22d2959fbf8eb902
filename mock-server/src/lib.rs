use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "agent@example.test";
pub const DEMO_PASSWORD: &str = "correct-horse";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub state: String,
    pub description: Option<String>,
    pub open: bool,
}

#[derive(Deserialize)]
pub struct CreateJob {
    pub title: String,
    pub state: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateJob {
    pub title: Option<String>,
    pub description: Option<String>,
    pub open: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListJobs {
    pub state: Option<String>,
    pub limit: Option<usize>,
    pub open: Option<bool>,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Refresh {
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokens {
    pub token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
    pub total: usize,
}

/// Success envelope: `{ code, message?, data }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

/// Error envelope: `{ code, message, details? }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

type Failure = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<(StatusCode, Json<Envelope<T>>), Failure>;

fn ok<T>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((
        status,
        Json(Envelope {
            code: status.as_u16(),
            message: None,
            data,
        }),
    ))
}

fn fail(status: StatusCode, code: &str, message: &str) -> Failure {
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }),
    )
}

#[derive(Default)]
pub struct Store {
    users: Vec<(User, String)>,
    jobs: Vec<Job>,
    access_tokens: BTreeMap<String, Uuid>,
    refresh_tokens: BTreeMap<String, Uuid>,
}

impl Store {
    fn seeded() -> Self {
        let user = User {
            id: Uuid::new_v4(),
            email: DEMO_EMAIL.to_string(),
            name: "Demo Agent".to_string(),
            role: "agent".to_string(),
        };
        Self {
            users: vec![(user, DEMO_PASSWORD.to_string())],
            ..Self::default()
        }
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().map(|(u, _)| u).find(|u| u.id == id)
    }

    fn issue(&mut self, user: User) -> AuthTokens {
        let token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens.insert(token.clone(), user.id);
        self.refresh_tokens.insert(refresh_token.clone(), user.id);
        AuthTokens {
            token,
            refresh_token,
            user,
        }
    }

    /// Invalidate every access token, as if they all expired at once.
    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    /// Forget every access and refresh token.
    pub fn revoke_sessions(&mut self) {
        self.access_tokens.clear();
        self.refresh_tokens.clear();
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Arc::new(RwLock::new(Store::seeded())))
}

/// Build the router over a caller-held store so tests can manipulate it.
pub fn app_with_store(db: Db) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/{id}", get(get_job).put(update_job).delete(delete_job))
        .route("/api/echo", get(echo))
        .route("/api/status/{code}", get(status))
        .with_state(db)
}

pub fn seeded_store() -> Db {
    Arc::new(RwLock::new(Store::seeded()))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_store(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_store(db)).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorize(headers: &HeaderMap, store: &Store) -> Result<Uuid, Failure> {
    bearer(headers)
        .and_then(|token| store.access_tokens.get(token).copied())
        .ok_or_else(|| {
            fail(
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Missing or expired access token",
            )
        })
}

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> ApiResult<AuthTokens> {
    let mut store = db.write().await;
    let user = store
        .users
        .iter()
        .find(|(u, password)| u.email == input.email && *password == input.password)
        .map(|(u, _)| u.clone())
        .ok_or_else(|| {
            fail(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Email or password is incorrect",
            )
        })?;
    ok(StatusCode::OK, store.issue(user))
}

async fn refresh(State(db): State<Db>, Json(input): Json<Refresh>) -> ApiResult<AuthTokens> {
    let mut store = db.write().await;
    let user_id = store
        .refresh_tokens
        .remove(&input.refresh_token)
        .ok_or_else(|| {
            fail(
                StatusCode::UNAUTHORIZED,
                "INVALID_REFRESH_TOKEN",
                "Refresh token is not recognised",
            )
        })?;
    let user = store
        .user(user_id)
        .cloned()
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "INVALID_REFRESH_TOKEN", "Unknown user"))?;
    ok(StatusCode::OK, store.issue(user))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    authorize(&headers, &store)?;
    if let Some(token) = bearer(&headers) {
        store.access_tokens.remove(token);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> ApiResult<User> {
    let store = db.read().await;
    let user_id = authorize(&headers, &store)?;
    let user = store
        .user(user_id)
        .cloned()
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "NOT_FOUND", "User not found"))?;
    ok(StatusCode::OK, user)
}

async fn list_jobs(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ListJobs>,
) -> ApiResult<JobList> {
    let store = db.read().await;
    authorize(&headers, &store)?;
    let matching: Vec<Job> = store
        .jobs
        .iter()
        .filter(|j| params.state.as_ref().map_or(true, |s| j.state == *s))
        .filter(|j| params.open.map_or(true, |o| j.open == o))
        .cloned()
        .collect();
    let total = matching.len();
    let jobs = matching
        .into_iter()
        .take(params.limit.unwrap_or(usize::MAX))
        .collect();
    ok(StatusCode::OK, JobList { jobs, total })
}

async fn create_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateJob>,
) -> ApiResult<Job> {
    let mut store = db.write().await;
    authorize(&headers, &store)?;
    if input.title.trim().is_empty() {
        let mut failure = fail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            "title must not be empty",
        );
        failure.1.details = Some(serde_json::json!({ "field": "title" }));
        return Err(failure);
    }
    let job = Job {
        id: Uuid::new_v4(),
        title: input.title,
        state: input.state,
        description: input.description,
        open: true,
    };
    store.jobs.push(job.clone());
    ok(StatusCode::CREATED, job)
}

fn job_not_found() -> Failure {
    fail(StatusCode::NOT_FOUND, "NOT_FOUND", "Job not found")
}

async fn get_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Job> {
    let store = db.read().await;
    authorize(&headers, &store)?;
    let job = store
        .jobs
        .iter()
        .find(|j| j.id == id)
        .cloned()
        .ok_or_else(job_not_found)?;
    ok(StatusCode::OK, job)
}

async fn update_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateJob>,
) -> ApiResult<Job> {
    let mut store = db.write().await;
    authorize(&headers, &store)?;
    let job = store
        .jobs
        .iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(job_not_found)?;
    if let Some(title) = input.title {
        job.title = title;
    }
    if let Some(description) = input.description {
        job.description = Some(description);
    }
    if let Some(open) = input.open {
        job.open = open;
    }
    let job = job.clone();
    ok(StatusCode::OK, job)
}

async fn delete_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    authorize(&headers, &store)?;
    let before = store.jobs.len();
    store.jobs.retain(|j| j.id != id);
    if store.jobs.len() == before {
        return Err(job_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Echo the received query and headers back as a raw (unwrapped) body.
async fn echo(
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(serde_json::json!({ "query": query, "headers": headers }))
}

/// Reply with the requested status and a plain-text body.
async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_without_empty_message() {
        let env = Envelope {
            code: 200,
            message: None,
            data: 1,
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 200, "data": 1 }));
    }

    #[test]
    fn error_body_omits_missing_details() {
        let (status, Json(body)) = fail(StatusCode::NOT_FOUND, "NOT_FOUND", "gone");
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "code": "NOT_FOUND", "message": "gone" }));
    }

    #[test]
    fn bearer_requires_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer(&headers), None);
    }

    #[test]
    fn issued_tokens_authorize_until_expired() {
        let mut store = Store::seeded();
        let user = store.users[0].0.clone();
        let issued = store.issue(user.clone());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", issued.token).parse().unwrap(),
        );
        assert_eq!(authorize(&headers, &store).unwrap(), user.id);

        store.expire_access_tokens();
        let (status, Json(body)) = authorize(&headers, &store).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "TOKEN_EXPIRED");
    }

    #[test]
    fn list_params_are_optional() {
        let params: ListJobs = serde_json::from_str("{}").unwrap();
        assert!(params.state.is_none());
        assert!(params.limit.is_none());
        assert!(params.open.is_none());
    }
}
