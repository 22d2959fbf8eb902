use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, AuthTokens, Envelope, ErrorBody, Job, JobList, DEMO_EMAIL, DEMO_PASSWORD};
use serde_json::Value;
use tower::{Service, ServiceExt};

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn login_body() -> String {
    format!(r#"{{"email":"{DEMO_EMAIL}","password":"{DEMO_PASSWORD}"}}"#)
}

async fn call(app: &mut axum::routing::RouterIntoService<String>, req: Request<String>) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(req).await.unwrap()
}

// --- auth ---

#[tokio::test]
async fn login_returns_token_envelope() {
    let resp = app()
        .oneshot(json_request("POST", "/api/auth/login", None, &login_body()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope<AuthTokens> = body_json(resp).await;
    assert_eq!(env.code, 200);
    assert_eq!(env.data.user.email, DEMO_EMAIL);
    assert!(!env.data.token.is_empty());
    assert_ne!(env.data.token, env.data.refresh_token);
}

#[tokio::test]
async fn login_with_wrong_password_returns_401() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            &format!(r#"{{"email":"{DEMO_EMAIL}","password":"nope"}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn jobs_require_bearer_token() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/jobs").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "TOKEN_EXPIRED");
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let mut app = app().into_service();
    let resp = call(&mut app, json_request("POST", "/api/auth/login", None, &login_body())).await;
    let issued: Envelope<AuthTokens> = body_json(resp).await;
    let body = format!(r#"{{"refresh_token":"{}"}}"#, issued.data.refresh_token);

    let resp = call(&mut app, json_request("POST", "/api/auth/refresh", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed: Envelope<AuthTokens> = body_json(resp).await;
    assert_ne!(refreshed.data.token, issued.data.token);

    let resp = call(&mut app, json_request("POST", "/api/auth/refresh", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_token() {
    let mut app = app().into_service();
    let resp = call(&mut app, json_request("POST", "/api/auth/login", None, &login_body())).await;
    let issued: Envelope<AuthTokens> = body_json(resp).await;
    let token = issued.data.token.as_str();

    let resp = call(&mut app, json_request("GET", "/api/auth/me", Some(token), "")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = call(&mut app, json_request("POST", "/api/auth/logout", Some(token), "")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = call(&mut app, json_request("GET", "/api/auth/me", Some(token), "")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- utility routes ---

#[tokio::test]
async fn echo_returns_query_and_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/echo?state=QLD&limit=20")
                .header("x-portal", "agent")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echoed: Value = body_json(resp).await;
    assert_eq!(echoed["query"]["state"], "QLD");
    assert_eq!(echoed["query"]["limit"], "20");
    assert_eq!(echoed["headers"]["x-portal"], "agent");
}

#[tokio::test]
async fn status_route_returns_plain_text() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/status/503").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "status 503");
}

// --- jobs ---

#[tokio::test]
async fn create_job_rejects_blank_title_with_details() {
    let mut app = app().into_service();
    let resp = call(&mut app, json_request("POST", "/api/auth/login", None, &login_body())).await;
    let issued: Envelope<AuthTokens> = body_json(resp).await;

    let resp = call(
        &mut app,
        json_request(
            "POST",
            "/api/jobs",
            Some(&issued.data.token),
            r#"{"title":"  ","state":"QLD"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.details.unwrap()["field"], "title");
}

#[tokio::test]
async fn get_job_bad_uuid_returns_400() {
    let mut app = app().into_service();
    let resp = call(&mut app, json_request("POST", "/api/auth/login", None, &login_body())).await;
    let issued: Envelope<AuthTokens> = body_json(resp).await;

    let resp = call(
        &mut app,
        json_request("GET", "/api/jobs/not-a-uuid", Some(&issued.data.token), ""),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_crud_lifecycle() {
    let mut app = app().into_service();

    let resp = call(&mut app, json_request("POST", "/api/auth/login", None, &login_body())).await;
    let issued: Envelope<AuthTokens> = body_json(resp).await;
    let token = Some(issued.data.token.as_str());

    // create two jobs in different states
    let resp = call(
        &mut app,
        json_request("POST", "/api/jobs", token, r#"{"title":"Fix roof","state":"QLD"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Envelope<Job> = body_json(resp).await;
    assert_eq!(created.code, 201);
    assert!(created.data.open);
    let id = created.data.id;

    let resp = call(
        &mut app,
        json_request("POST", "/api/jobs", token, r#"{"title":"Paint fence","state":"NSW"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // list with a state filter
    let resp = call(&mut app, json_request("GET", "/api/jobs?state=QLD", token, "")).await;
    let list: Envelope<JobList> = body_json(resp).await;
    assert_eq!(list.data.total, 1);
    assert_eq!(list.data.jobs[0].id, id);

    // limit keeps the unlimited total
    let resp = call(&mut app, json_request("GET", "/api/jobs?limit=1", token, "")).await;
    let list: Envelope<JobList> = body_json(resp).await;
    assert_eq!(list.data.total, 2);
    assert_eq!(list.data.jobs.len(), 1);

    // partial update
    let resp = call(
        &mut app,
        json_request("PUT", &format!("/api/jobs/{id}"), token, r#"{"open":false}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Envelope<Job> = body_json(resp).await;
    assert_eq!(updated.data.title, "Fix roof");
    assert!(!updated.data.open);

    // delete, then 404 on repeat
    let resp = call(&mut app, json_request("DELETE", &format!("/api/jobs/{id}"), token, "")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = call(&mut app, json_request("DELETE", &format!("/api/jobs/{id}"), token, "")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "NOT_FOUND");

    let resp = call(&mut app, json_request("GET", &format!("/api/jobs/{id}"), token, "")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
