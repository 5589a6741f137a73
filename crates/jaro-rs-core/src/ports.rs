//! Contracts between the engine and its collaborators.
//!
//! I/O ports are async traits; `Clock`, `IdGenerator` and `Logger` are plain
//! traits. Every port is used behind `Arc<dyn Port>` so reference and
//! production implementations are interchangeable.

use crate::context::RequestContext;
use crate::error::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jaro_rs_protocol::{
    ApprovalRequest, AuditEvent, Plan, Step, StepResult, Task, Tool, ToolMetadata,
};
use std::sync::Arc;

/// Mutation applied by [`TaskRepository::update_task`]. Returning `Err`
/// aborts the update and leaves the stored task unchanged.
pub type TaskMutation<'a> = &'a mut (dyn FnMut(&mut Task) -> Result<(), CoreError> + Send);

/// Keyed store for tasks. Reads and writes exchange owned copies.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert or replace a task.
    async fn save_task(&self, ctx: &RequestContext, task: &Task) -> Result<(), CoreError>;

    /// Load a copy of a task. `NotFound` for unknown ids.
    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> Result<Task, CoreError>;

    /// Atomic read-modify-write of one task. Concurrent updates of the same
    /// task are serialized; the mutation sees the latest committed state.
    /// Returns the committed copy.
    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        mutation: TaskMutation<'_>,
    ) -> Result<Task, CoreError>;
}

/// Keyed store for plans.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn save_plan(&self, ctx: &RequestContext, plan: &Plan) -> Result<(), CoreError>;

    async fn get_plan(&self, ctx: &RequestContext, plan_id: &str) -> Result<Plan, CoreError>;
}

/// Store for approval requests keyed by `(task_id, step_id)`.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn save_approval(
        &self,
        ctx: &RequestContext,
        approval: &ApprovalRequest,
    ) -> Result<(), CoreError>;

    async fn get_approval(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        step_id: &str,
    ) -> Result<ApprovalRequest, CoreError>;

    async fn list_open_approvals(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<ApprovalRequest>, CoreError>;
}

/// Append-only audit sink. Failures never block the engine.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn save_event(&self, ctx: &RequestContext, event: &AuditEvent) -> Result<(), CoreError>;
}

/// Produces a plan from a task's normalized intent. Must not touch
/// repositories.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(
        &self,
        ctx: &RequestContext,
        task: &Task,
        tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError>;
}

/// Runs one step. `Err` signals an infrastructure failure; a logical
/// failure is `Ok` with `success == false`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute_step(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step: &Step,
    ) -> Result<StepResult, CoreError>;
}

/// Tool discovery for planners and executors.
pub trait ToolRegistry: Send + Sync {
    fn list_tools(&self) -> Vec<ToolMetadata>;

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// Structured logging with key/value fields.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str, fields: &[(&str, &str)]);

    fn warn(&self, message: &str, fields: &[(&str, &str)]);

    fn error(&self, message: &str, fields: &[(&str, &str)]);
}
