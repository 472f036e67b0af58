mod common;

use agency_reporting::api;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@reporting.example.gov";
const ADMIN_PASSWORD: &str = "Reporting2025";

async fn app() -> Router {
    let state = setup().await;
    state.users.ensure_bootstrap_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    api::router(state)
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

fn q1_2025() -> Value {
    json!({
        "period_type": "quarter",
        "period_number": 1,
        "year": 2025,
        "start_date": "2025-01-01",
        "end_date": "2025-03-31",
        "status": "open"
    })
}

#[tokio::test]
async fn duplicate_period_returns_a_conflict_envelope() {
    let app = app().await;
    let token = login(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/periods", Some(&token), Some(q1_2025())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["display_name"], "Q1 2025");
    assert_eq!(body["data"]["status"], "open");

    let (status, body) = send(&app, Method::POST, "/api/periods", Some(&token), Some(q1_2025())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Period Q1 2025 already exists");
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/periods", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, Method::GET, "/api/periods", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "Wrong2025password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication failed");
}

#[tokio::test]
async fn malformed_bodies_and_ids_are_bad_requests() {
    let app = app().await;
    let token = login(&app).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/periods")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send(&app, Method::GET, "/api/periods/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let app = app().await;
    let token = login(&app).await;

    let mut input = q1_2025();
    input["period_number"] = json!(9);
    let (status, body) = send(&app, Method::POST, "/api/periods", Some(&token), Some(input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_period_is_not_found() {
    let app = app().await;
    let token = login(&app).await;
    let uri = format!("/api/periods/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn logged_out_tokens_stop_working() {
    let app = app().await;
    let token = login(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], ADMIN_EMAIL);

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn audit_trail_is_browsable_by_subject() {
    let app = app().await;
    let token = login(&app).await;

    let (_, created) = send(&app, Method::POST, "/api/periods", Some(&token), Some(q1_2025())).await;
    let period_id = created["data"]["period_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/periods/{}/status", period_id),
        Some(&token),
        Some(json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/audit-logs/subjects/period/{}", period_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[1]["action"], "status_change");
}
