use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use jaro_rs_core::RequestContext;
use jaro_rs_protocol::{ApprovalRequest, Plan, Task, TaskStatus};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SERVICE_NAME: &str = "jaro-orchestrator";

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub input: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub step_id: String,
    pub approved: bool,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelTaskRequest {
    pub user_id: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), ApiError> {
    let ctx = state.request_context();
    let task = state
        .orchestrator
        .start_task(&ctx, &request.input, &request.user_id)
        .await?;
    if state.auto_run() {
        spawn_run(&state, task.id.clone());
    }
    let response = CreateTaskResponse {
        task_id: task.id,
        status: task.status,
        created_at: task.created_at,
        user_id: task.user_id,
        input: task.input,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Drive a new task in the background, outside the request's deadline.
fn spawn_run(state: &AppState, task_id: String) {
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.run_task(&RequestContext::new(), &task_id).await {
            Ok(task) => info!("background run finished (task_id={task_id}, status={})", task.status),
            Err(err) => warn!("background run failed (task_id={task_id}, error={err})"),
        }
    });
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let ctx = state.request_context();
    let task = state.orchestrator.get_task_status(&ctx, &task_id).await?;
    Ok(Json(task))
}

pub async fn run_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let ctx = state.request_context();
    let task = state.orchestrator.run_task(&ctx, &task_id).await?;
    Ok(Json(task))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let ctx = state.request_context();
    let plan = state.orchestrator.get_plan(&ctx, &task_id).await?;
    Ok(Json(plan))
}

pub async fn get_approval(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let ctx = state.request_context();
    state
        .orchestrator
        .pending_approval(&ctx, &task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task {task_id} is not waiting for approval")))
}

pub async fn decide_approval(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<ApprovalDecisionRequest>,
) -> Result<Json<Task>, ApiError> {
    let ctx = state.request_context();
    let task = state
        .orchestrator
        .handle_approval(
            &ctx,
            &task_id,
            &request.step_id,
            request.approved,
            &request.user_id,
        )
        .await?;
    Ok(Json(task))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<CancelTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let ctx = state.request_context();
    let task = state
        .orchestrator
        .cancel_task(&ctx, &task_id, &request.user_id)
        .await?;
    Ok(Json(task))
}
