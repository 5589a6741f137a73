use async_trait::async_trait;
use jaro_rs_core::{CoreError, Planner, RequestContext};
use jaro_rs_protocol::{Plan, Step, Task, ToolMetadata};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the same steps for every task, in a plan with id `plan-{task_id}`.
#[derive(Debug)]
pub struct ScriptedPlanner {
    steps: Vec<Step>,
    calls: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn create_plan(
        &self,
        _ctx: &RequestContext,
        task: &Task,
        _tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Plan {
            id: format!("plan-{}", task.id),
            task_id: task.id.clone(),
            goal: task.normalized_intent.clone(),
            steps: self.steps.clone(),
            risk_summary: "fixed".to_string(),
        })
    }
}

/// Planner that fails with a fixed error.
#[derive(Debug)]
pub struct FailingPlanner {
    error: CoreError,
}

impl FailingPlanner {
    pub fn new(error: CoreError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Planner for FailingPlanner {
    async fn create_plan(
        &self,
        _ctx: &RequestContext,
        _task: &Task,
        _tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError> {
        Err(self.error.clone())
    }
}

/// Plans like [`ScriptedPlanner`] but cancels the caller's request before
/// answering.
#[derive(Debug)]
pub struct CancelingPlanner {
    inner: ScriptedPlanner,
}

impl CancelingPlanner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            inner: ScriptedPlanner::new(steps),
        }
    }
}

#[async_trait]
impl Planner for CancelingPlanner {
    async fn create_plan(
        &self,
        ctx: &RequestContext,
        task: &Task,
        tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError> {
        ctx.cancel();
        self.inner.create_plan(ctx, task, tools).await
    }
}

/// Planner that never answers; only cancellation ends the call.
#[derive(Debug, Default)]
pub struct StalledPlanner;

#[async_trait]
impl Planner for StalledPlanner {
    async fn create_plan(
        &self,
        _ctx: &RequestContext,
        _task: &Task,
        _tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError> {
        std::future::pending().await
    }
}
