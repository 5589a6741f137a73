//! Orchestration engine: the only writer of task status.

mod approvals;
mod audit;
mod lifecycle;

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::memory::{
    InMemoryApprovalRepository, InMemoryAuditRepository, InMemoryPlanRepository,
    InMemoryTaskRepository, InMemoryToolRegistry, LogLogger, NaiveExecutor, NaivePlanner,
    SystemClock, UuidGenerator,
};
use crate::ports::{
    ApprovalRepository, AuditRepository, Clock, Executor, IdGenerator, Logger, PlanRepository,
    Planner, TaskRepository, ToolRegistry,
};
use jaro_rs_config::EngineConfig;
use jaro_rs_protocol::audit::{TASK_CANCELED, TASK_CREATED};
use jaro_rs_protocol::{ApprovalRequest, Plan, Task, TaskStatus};
use std::sync::Arc;

/// Task metadata key holding the id of the step whose approval was granted
/// and not yet consumed by execution.
pub const APPROVED_STEP_KEY: &str = "approval.granted_step";
/// Task metadata key holding the reason a task failed.
pub const FAILURE_REASON_KEY: &str = "failure_reason";
/// Task metadata key holding the user who canceled a task.
pub const CANCELED_BY_KEY: &str = "canceled_by";
/// Actor recorded on audit events the engine emits on its own behalf.
pub const ENGINE_ACTOR: &str = "jaro-engine";

/// Collaborators the engine drives.
#[derive(Clone)]
pub struct EnginePorts {
    pub tasks: Arc<dyn TaskRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub tools: Arc<dyn ToolRegistry>,
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<dyn Executor>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub logger: Arc<dyn Logger>,
}

impl EnginePorts {
    /// Reference adapters with the built-in tools.
    pub fn in_memory() -> Self {
        Self::in_memory_with_tools(Arc::new(InMemoryToolRegistry::with_builtin_tools()))
    }

    /// Reference adapters planning and executing against `tools`.
    pub fn in_memory_with_tools(tools: Arc<dyn ToolRegistry>) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UuidGenerator);
        Self {
            tasks: Arc::new(InMemoryTaskRepository::new()),
            plans: Arc::new(InMemoryPlanRepository::new()),
            approvals: Arc::new(InMemoryApprovalRepository::new()),
            audit: Arc::new(InMemoryAuditRepository::new()),
            planner: Arc::new(NaivePlanner::new(ids.clone())),
            executor: Arc::new(NaiveExecutor::new(tools.clone())),
            tools,
            clock: Arc::new(SystemClock),
            ids,
            logger: Arc::new(LogLogger),
        }
    }

    pub fn with_tasks(mut self, tasks: Arc<dyn TaskRepository>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_plans(mut self, plans: Arc<dyn PlanRepository>) -> Self {
        self.plans = plans;
        self
    }

    pub fn with_approvals(mut self, approvals: Arc<dyn ApprovalRepository>) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditRepository>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }
}

/// Coordinates planning, execution and approvals for tasks.
///
/// Every status change goes through [`TaskRepository::update_task`], so the
/// engine holds no lock of its own and can be shared behind an `Arc`.
pub struct Orchestrator {
    config: EngineConfig,
    ports: EnginePorts,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Self {
        Self { config, ports }
    }

    /// Engine with reference adapters and default policy.
    pub fn in_memory() -> Self {
        Self::new(EngineConfig::default(), EnginePorts::in_memory())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ports(&self) -> &EnginePorts {
        &self.ports
    }

    /// Create a task in `NEW` and persist it.
    pub async fn start_task(
        &self,
        ctx: &RequestContext,
        input: &str,
        user_id: &str,
    ) -> Result<Task, CoreError> {
        require("input", input)?;
        require("user_id", user_id)?;
        ctx.check()?;

        let mut task = Task::new(self.ports.ids.new_id(), input, user_id, self.ports.clock.now());
        task.channel = self.config.default_channel.clone();
        task.target_agent = self.config.default_target_agent.clone();
        self.ports.tasks.save_task(ctx, &task).await?;

        self.ports
            .logger
            .info("task created", &[("task_id", &task.id), ("user_id", user_id)]);
        let event = self
            .audit_event(ctx, &task.id, TASK_CREATED, user_id)
            .with("input", task.input.clone())
            .with("channel", task.channel.clone())
            .with("target_agent", task.target_agent.clone());
        self.emit(event).await;
        Ok(task)
    }

    /// Current copy of a task.
    pub async fn get_task_status(
        &self,
        ctx: &RequestContext,
        task_id: &str,
    ) -> Result<Task, CoreError> {
        require("task_id", task_id)?;
        self.ports.tasks.get_task(ctx, task_id).await
    }

    /// Plan attached to a task. `NotFound` until the task has been planned.
    pub async fn get_plan(&self, ctx: &RequestContext, task_id: &str) -> Result<Plan, CoreError> {
        let task = self.get_task_status(ctx, task_id).await?;
        let plan_id = task
            .plan_id
            .ok_or_else(|| CoreError::NotFound(format!("task {task_id} has no plan")))?;
        self.ports.plans.get_plan(ctx, &plan_id).await
    }

    /// Open approval gating the task, if it is waiting on one.
    pub async fn pending_approval(
        &self,
        ctx: &RequestContext,
        task_id: &str,
    ) -> Result<Option<ApprovalRequest>, CoreError> {
        let task = self.get_task_status(ctx, task_id).await?;
        if task.status != TaskStatus::WaitingApproval {
            return Ok(None);
        }
        let Some(step_id) = task.current_step_id.as_deref() else {
            return Ok(None);
        };
        match self.ports.approvals.get_approval(ctx, task_id, step_id).await {
            Ok(approval) if approval.is_open() => Ok(Some(approval)),
            Ok(_) | Err(CoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Move any non-terminal task to `CANCELED`.
    pub async fn cancel_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        user_id: &str,
    ) -> Result<Task, CoreError> {
        require("task_id", task_id)?;
        require("user_id", user_id)?;
        let now = self.ports.clock.now();
        let mut previous = None;
        let task = self
            .ports
            .tasks
            .update_task(ctx, task_id, &mut |task: &mut Task| {
                if task.is_finished() {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} is already {}",
                        task.id, task.status
                    )));
                }
                previous = Some(task.status);
                task.transition(TaskStatus::Canceled, now)?;
                task.metadata.remove(APPROVED_STEP_KEY);
                task.metadata
                    .insert(CANCELED_BY_KEY.to_string(), user_id.to_string());
                Ok(())
            })
            .await?;

        let previous = previous.map(|status| status.as_str()).unwrap_or_default();
        self.ports.logger.info(
            "task canceled",
            &[("task_id", task_id), ("user_id", user_id), ("previous_status", previous)],
        );
        let event = self
            .audit_event(ctx, task_id, TASK_CANCELED, user_id)
            .with("previous_status", previous);
        self.emit(event).await;
        Ok(task)
    }
}

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

/// Commit guard: the task is still executing `step_id`.
fn ensure_executing(task: &Task, step_id: &str) -> Result<(), CoreError> {
    if task.status != TaskStatus::Executing {
        return Err(CoreError::FailedPrecondition(format!(
            "task {} is {}, expected EXECUTING",
            task.id, task.status
        )));
    }
    if !task.is_current_step(step_id) {
        return Err(CoreError::FailedPrecondition(format!(
            "step {step_id} is no longer current for task {}",
            task.id
        )));
    }
    Ok(())
}
