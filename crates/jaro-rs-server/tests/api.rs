//! HTTP API tests driven through the axum router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jaro_rs_config::{EngineConfig, ServerConfig};
use jaro_rs_core::memory::InMemoryToolRegistry;
use jaro_rs_core::{EnginePorts, Orchestrator};
use jaro_rs_protocol::RiskLevel;
use jaro_rs_server::{AppState, router};
use jaro_rs_test_utils::StubTool;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(engine: EngineConfig) -> Router {
    let tools = InMemoryToolRegistry::with_builtin_tools();
    tools.register(Arc::new(
        StubTool::new("flight_booking", RiskLevel::High).with_category("travel"),
    ));
    let orchestrator = Orchestrator::new(
        engine,
        EnginePorts::in_memory_with_tools(Arc::new(tools)),
    );
    router(AppState::new(Arc::new(orchestrator), ServerConfig::default()))
}

fn app() -> Router {
    app_with(EngineConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create(app: &Router, input: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/tasks",
        Some(json!({"input": input, "user_id": "user-42"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["task_id"].as_str().expect("task_id").to_string()
}

#[tokio::test]
async fn health_reports_service() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "jaro-orchestrator");
}

#[tokio::test]
async fn create_task_returns_summary() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({"input": "book a flight", "user_id": "user-42"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "NEW");
    assert_eq!(body["user_id"], "user-42");
    assert_eq!(body["input"], "book a flight");
    assert!(body["created_at"].is_string());

    let task_id = body["task_id"].as_str().expect("task_id");
    let (status, task) = send(&app, "GET", &format!("/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["id"], task_id);
    assert_eq!(task["normalized_intent"], "book a flight");
}

#[tokio::test]
async fn blank_fields_are_bad_requests() {
    let (status, body) = send(
        &app(),
        "POST",
        "/tasks",
        Some(json!({"input": "", "user_id": "user-42"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request");
    assert!(body["details"].as_str().is_some_and(|d| d.contains("input")));
}

#[tokio::test]
async fn missing_fields_are_rejected_by_the_extractor() {
    let (status, _) = send(&app(), "POST", "/tasks", Some(json!({"input": "x"}))).await;
    assert!(status.is_client_error(), "{status}");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let (status, body) = send(&app(), "GET", "/tasks/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn approval_flow_over_http() {
    let app = app();
    let task_id = create(&app, "book a flight").await;

    let (status, task) = send(&app, "POST", &format!("/tasks/{task_id}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "WAITING_APPROVAL");
    let step_id = task["current_step_id"].as_str().expect("step").to_string();

    let (status, plan) = send(&app, "GET", &format!("/tasks/{task_id}/plan"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["steps"][1]["type"], "TOOL_CALL");
    assert_eq!(plan["steps"][1]["requires_approval"], true);

    let (status, approval) =
        send(&app, "GET", &format!("/tasks/{task_id}/approval"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["step_id"], step_id.as_str());
    assert_eq!(approval["status"], "OPEN");

    let decision = json!({"step_id": step_id, "approved": true, "user_id": "user-42"});
    let (status, task) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/approvals"),
        Some(decision.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "EXECUTING");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/approvals"),
        Some(decision),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid task state");

    let (status, task) = send(&app, "POST", &format!("/tasks/{task_id}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "DONE");

    let (status, _) = send(&app, "GET", &format!("/tasks/{task_id}/approval"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_over_http() {
    let app = app();
    let task_id = create(&app, "echo hi").await;
    let uri = format!("/tasks/{task_id}/cancel");

    let (status, task) = send(&app, "POST", &uri, Some(json!({"user_id": "user-42"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "CANCELED");

    let (status, _) = send(&app, "POST", &uri, Some(json!({"user_id": "user-42"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn plan_is_missing_before_planning() {
    let app = app();
    let task_id = create(&app, "echo hi").await;
    let (status, _) = send(&app, "GET", &format!("/tasks/{task_id}/plan"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auto_run_drives_new_tasks_in_the_background() {
    let app = app_with(EngineConfig {
        auto_run: true,
        ..EngineConfig::default()
    });
    let task_id = create(&app, "echo hi").await;

    let mut status = Value::Null;
    for _ in 0..100 {
        let (_, task) = send(&app, "GET", &format!("/tasks/{task_id}"), None).await;
        status = task["status"].clone();
        if status == "DONE" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, "DONE");
}
