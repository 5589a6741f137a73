//! HTTP driving adapter for the JARO orchestration engine.
//!
//! Endpoints:
//! - GET  /health
//! - POST /tasks
//! - GET  /tasks/{id}
//! - POST /tasks/{id}/run
//! - GET  /tasks/{id}/plan
//! - GET  /tasks/{id}/approval
//! - POST /tasks/{id}/approvals
//! - POST /tasks/{id}/cancel

mod error;
mod handlers;
mod logging;
mod state;

pub use error::ApiError;
pub use handlers::{
    ApprovalDecisionRequest, CancelTaskRequest, CreateTaskRequest, CreateTaskResponse,
    SERVICE_NAME,
};
pub use logging::{init_logging, level_filter};
pub use state::AppState;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use jaro_rs_config::JaroConfig;
use log::{info, warn};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Router over `state`, with the configured body limit.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.server.max_body_size).unwrap_or(usize::MAX);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", post(handlers::create_task))
        .route("/tasks/{id}", get(handlers::get_task))
        .route("/tasks/{id}/run", post(handlers::run_task))
        .route("/tasks/{id}/plan", get(handlers::get_plan))
        .route("/tasks/{id}/approval", get(handlers::get_approval))
        .route("/tasks/{id}/approvals", post(handlers::decide_approval))
        .route("/tasks/{id}/cancel", post(handlers::cancel_task))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind `config.server` and serve until Ctrl+C.
pub async fn serve(config: &JaroConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "jaro server listening (address={address}, auto_run={})",
        config.engine.auto_run
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("jaro server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal (error={err})");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
