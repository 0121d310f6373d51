//! API Integration Tests
//!
//! Every test drives the full router over in-memory stores.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use taskdesk_api::create_router_for_testing;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &Router, username: &str, password: &str) -> Response {
    send(
        app,
        create_json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    send(
        app,
        create_json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await
}

/// Register a user and return a fresh session token
async fn session(app: &Router, username: &str) -> String {
    let response = register(app, username, "correct horse").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = login(app, username, "correct horse").await;
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

async fn create_task(app: &Router, token: &str, title: &str, completed: bool) -> Value {
    let response = send(
        app,
        create_json_request(
            "POST",
            "/api/tasks",
            Some(token),
            Some(json!({ "title": title, "completed": completed })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn assert_unauthorized(response: Response) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["message"], "Authentication required");
}

fn app() -> Router {
    create_router_for_testing().unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let response = send(&app, create_json_request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = app();

    let response = send(&app, create_json_request("GET", "/ready", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["user_store"], true);
    assert_eq!(json["checks"]["revocation_store"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();

    // Generate at least one request and one rejection to report
    send(&app, create_json_request("GET", "/health", None, None)).await;
    send(&app, create_json_request("GET", "/api/auth/me", None, None)).await;

    let response = send(&app, create_json_request("GET", "/metrics", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = body_text(response).await;
    assert!(text.contains("taskdesk_http_requests_total"));
    assert!(text.contains("taskdesk_auth_rejections_total"));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = app();

    let response = send(
        &app,
        create_json_request("GET", "/api-docs/openapi.json", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/auth/login"].is_object());
    assert!(json["paths"]["/api/tasks/{id}"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = app();

    let response = send(&app, create_json_request("GET", "/health", None, None)).await;
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app();

    let response = register(&app, "alice", "s3cret").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "User registered successfully");

    let response = login(&app, "alice", "s3cret").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_text(response).await;
    assert_eq!(token.split('.').count(), 3);

    let response = send(
        &app,
        create_json_request("GET", "/api/auth/me", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "alice");

    let response = send(
        &app,
        create_json_request("POST", "/api/auth/logout", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Logged out successfully");

    // The same token is now refused everywhere
    let response = send(
        &app,
        create_json_request("GET", "/api/auth/me", Some(&token), None),
    )
    .await;
    assert_unauthorized(response).await;

    let response = send(
        &app,
        create_json_request("GET", "/api/tasks", Some(&token), None),
    )
    .await;
    assert_unauthorized(response).await;
}

#[tokio::test]
async fn test_logout_does_not_affect_other_sessions() {
    let app = app();
    let first = session(&app, "alice").await;

    let response = login(&app, "alice", "correct horse").await;
    let second = body_text(response).await;
    assert_ne!(first, second);

    send(
        &app,
        create_json_request("POST", "/api/auth/logout", Some(&first), None),
    )
    .await;

    let response = send(
        &app,
        create_json_request("GET", "/api/auth/me", Some(&second), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_duplicate_user() {
    let app = app();

    let response = register(&app, "alice", "one").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = register(&app, "alice", "two").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["message"], "User already exists");

    // The original password still works
    let response = login(&app, "alice", "one").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_empty_fields() {
    let app = app();

    let response = register(&app, "", "pw").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(&app, "alice", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = login(&app, "", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_look_identical() {
    let app = app();
    register(&app, "alice", "right").await;

    let wrong_password = login(&app, "alice", "wrong").await;
    let unknown_user = login(&app, "nobody", "right").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_password).await, body_json(unknown_user).await);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = app();

    let response = send(&app, create_json_request("GET", "/api/tasks", None, None)).await;
    assert_unauthorized(response).await;

    let response = send(&app, create_json_request("GET", "/api/auth/me", None, None)).await;
    assert_unauthorized(response).await;
}

#[tokio::test]
async fn test_invalid_tokens_rejected() {
    let app = app();
    let token = session(&app, "alice").await;

    // Garbage
    let response = send(
        &app,
        create_json_request("GET", "/api/auth/me", Some("not-a-token"), None),
    )
    .await;
    assert_unauthorized(response).await;

    // Tampered signature
    let signature_start = token.rfind('.').unwrap() + 1;
    let flipped = if token.as_bytes()[signature_start + 4] == b'A' {
        "B"
    } else {
        "A"
    };
    let mut tampered = token.clone();
    tampered.replace_range(signature_start + 4..signature_start + 5, flipped);
    let response = send(
        &app,
        create_json_request("GET", "/api/auth/me", Some(&tampered), None),
    )
    .await;
    assert_unauthorized(response).await;

    // Wrong scheme
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_unauthorized(response).await;
}

#[tokio::test]
async fn test_public_routes_reject_bad_token() {
    let app = app();

    // A presented token is always checked, even where none is required
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("Content-Type", "application/json")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::from(
            json!({ "username": "alice", "password": "pw" }).to_string(),
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_unauthorized(response).await;
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = app();
    let token = session(&app, "alice").await;

    for _ in 0..2 {
        let response = send(
            &app,
            create_json_request("POST", "/api/auth/logout", Some(&token), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(
        &app,
        create_json_request("POST", "/api/auth/logout", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        create_json_request("POST", "/api/auth/logout", Some("garbage"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Task Tests
// =============================================================================

#[tokio::test]
async fn test_task_crud() {
    let app = app();
    let token = session(&app, "alice").await;

    let created = create_task(&app, &token, "write docs", false).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["title"], "write docs");
    assert_eq!(created["completed"], false);

    let response = send(
        &app,
        create_json_request("GET", &format!("/api/tasks/{id}"), Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "write docs");

    let response = send(
        &app,
        create_json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            Some(json!({ "title": "write better docs", "description": "chapter 2" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "write better docs");
    assert_eq!(json["description"], "chapter 2");

    let response = send(
        &app,
        create_json_request(
            "PATCH",
            &format!("/api/tasks/{id}/status"),
            Some(&token),
            Some(json!({ "completed": true })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["completed"], true);

    let response = send(
        &app,
        create_json_request("DELETE", &format!("/api/tasks/{id}"), Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        create_json_request("GET", &format!("/api/tasks/{id}"), Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_task_requires_title() {
    let app = app();
    let token = session(&app, "alice").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({ "title": "" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tasks_filters_and_sorts() {
    let app = app();
    let token = session(&app, "alice").await;

    create_task(&app, &token, "charlie", false).await;
    create_task(&app, &token, "alpha", true).await;
    create_task(&app, &token, "bravo", false).await;

    let titles = |json: Value| -> Vec<String> {
        json.as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap().to_string())
            .collect()
    };

    let response = send(&app, create_json_request("GET", "/api/tasks", Some(&token), None)).await;
    assert_eq!(
        titles(body_json(response).await),
        vec!["charlie", "alpha", "bravo"]
    );

    let response = send(
        &app,
        create_json_request("GET", "/api/tasks?sortBy=title", Some(&token), None),
    )
    .await;
    assert_eq!(
        titles(body_json(response).await),
        vec!["alpha", "bravo", "charlie"]
    );

    let response = send(
        &app,
        create_json_request("GET", "/api/tasks?completed=false", Some(&token), None),
    )
    .await;
    assert_eq!(titles(body_json(response).await), vec!["charlie", "bravo"]);

    let response = send(
        &app,
        create_json_request("GET", "/api/tasks?completed=true", Some(&token), None),
    )
    .await;
    assert_eq!(titles(body_json(response).await), vec!["alpha"]);
}

#[tokio::test]
async fn test_tasks_are_isolated_per_user() {
    let app = app();
    let alice = session(&app, "alice").await;
    let bob = session(&app, "bob").await;

    let task = create_task(&app, &alice, "alice only", false).await;
    let id = task["id"].as_i64().unwrap();

    // Bob sees an empty list
    let response = send(&app, create_json_request("GET", "/api/tasks", Some(&bob), None)).await;
    assert_eq!(body_json(response).await, json!([]));

    // And cannot touch Alice's task
    let response = send(
        &app,
        create_json_request("GET", &format!("/api/tasks/{id}"), Some(&bob), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        create_json_request(
            "PATCH",
            &format!("/api/tasks/{id}/status"),
            Some(&bob),
            Some(json!({ "completed": true })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        create_json_request("DELETE", &format!("/api/tasks/{id}"), Some(&bob), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Alice's task is untouched
    let response = send(
        &app,
        create_json_request("GET", &format!("/api/tasks/{id}"), Some(&alice), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["completed"], false);
}

#[tokio::test]
async fn test_missing_task_not_found() {
    let app = app();
    let token = session(&app, "alice").await;

    let response = send(
        &app,
        create_json_request("GET", "/api/tasks/999", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_token_for_unknown_user_rejected_on_tasks() {
    use std::time::Duration;
    use taskdesk_api::auth::{SigningKey, TokenCodec};
    use taskdesk_api::TEST_JWT_SECRET;

    let app = app();
    let codec = TokenCodec::new(
        SigningKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        "taskdesk",
        Duration::from_secs(3600),
    );
    let token = codec.issue_session("ghost").unwrap();

    let response = send(&app, create_json_request("GET", "/api/tasks", Some(&token), None)).await;
    assert_unauthorized(response).await;
}
