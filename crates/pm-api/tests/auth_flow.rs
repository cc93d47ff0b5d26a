//! End-to-end request flows over in-memory stores: the full router with the
//! authentication filter layered, exercised through `tower::ServiceExt`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pm_api::{router, AppState};
use pm_auth::{AuthState, JwtCodec};
use pm_services::{
    AuthService, InMemoryProjectStore, InMemoryTaskStore, InMemoryUserStore, ProjectService,
    TaskService,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let users = Arc::new(InMemoryUserStore::new());
    let projects = Arc::new(InMemoryProjectStore::new());
    let tasks = Arc::new(InMemoryTaskStore::new());
    let codec = Arc::new(JwtCodec::new(&"0123456789abcdef".repeat(4)).unwrap());

    let state = AppState {
        auth: Arc::new(AuthService::new(users.clone(), codec.clone(), 3600)),
        projects: Arc::new(ProjectService::new(
            projects.clone(),
            users.clone(),
            tasks.clone(),
        )),
        tasks: Arc::new(TaskService::new(tasks, projects)),
    };
    let auth_state = AuthState::new(codec, users);

    router(state, auth_state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn register_body(email: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": "pw123456",
        "confirmPassword": "pw123456",
    })
}

async fn register(app: &Router, email: &str) -> (i64, String) {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth/register", None, register_body(email)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "Bearer");
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = app();
    let (id, _) = register(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "Ada@Example.com", "password": "pw123456" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get_request("/users/profile", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await;
    assert_eq!(profile["id"].as_i64().unwrap(), id);
    assert_eq!(profile["email"], "ada@example.com");
    // The password hash must never serialize
    assert!(profile.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = app();
    register(&app, "ada@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            register_body("ADA@example.com"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["errorCode"], "EMAIL_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_protected_route_without_identity_is_401() {
    let app = app();

    for request in [
        get_request("/users/profile", None),
        get_request("/users/profile", Some("not-a-token")),
        get_request("/projects", None),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["errorCode"], "INVALID_TOKEN");
    }
}

#[tokio::test]
async fn test_garbage_token_on_public_route_still_works() {
    let app = app();

    let response = app
        .oneshot(get_request("/test/hello", Some("garbage")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deactivation_revokes_outstanding_tokens() {
    let app = app();
    let (_, token) = register(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/profile")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Same token, still well-signed and unexpired, no longer authenticates
    let response = app
        .oneshot(get_request("/users/profile", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_project_authorization_rules() {
    let app = app();
    let (_, owner_token) = register(&app, "owner@example.com").await;
    let (member_id, member_token) = register(&app, "member@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/projects",
            Some(&owner_token),
            json!({ "name": "Apollo", "description": "Moonshot" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let project_id = body_json(response).await["id"].as_i64().unwrap();

    // Not yet a member: no visibility
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/projects/{}", project_id),
            Some(&member_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["errorCode"],
        "PROJECT_ACCESS_DENIED"
    );

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/projects/{}/members", project_id),
            Some(&owner_token),
            json!({ "userId": member_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Members can view but not modify
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/projects/{}", project_id),
            Some(&member_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/projects/{}", project_id),
            Some(&member_token),
            json!({ "name": "Apollo 2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner can never be removed, not even by themselves
    let owner_id = {
        let response = app
            .clone()
            .oneshot(get_request("/users/profile", Some(&owner_token)))
            .await
            .unwrap();
        body_json(response).await["id"].as_i64().unwrap()
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/projects/{}/members/{}", project_id, owner_id))
                .header("authorization", format!("Bearer {}", owner_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_task_flow() {
    let app = app();
    let (_, owner_token) = register(&app, "owner@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/projects",
            Some(&owner_token),
            json!({ "name": "Apollo" }),
        ))
        .await
        .unwrap();
    let project_id = body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/projects/{}/tasks", project_id),
            Some(&owner_token),
            json!({ "title": "Design the hull" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let task = body_json(response).await;
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["priority"], "MEDIUM");

    let task_id = task["id"].as_i64().unwrap();
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/tasks/{}", task_id),
            Some(&owner_token),
            json!({ "title": "Design the hull", "status": "IN_PROGRESS", "priority": "HIGH" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "IN_PROGRESS");

    let response = app
        .oneshot(get_request(
            &format!("/projects/{}/tasks", project_id),
            Some(&owner_token),
        ))
        .await
        .unwrap();
    let tasks = body_json(response).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}
