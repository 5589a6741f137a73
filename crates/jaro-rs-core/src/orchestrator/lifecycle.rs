//! Planning, the step loop, and verification.

use super::{
    APPROVED_STEP_KEY, ENGINE_ACTOR, FAILURE_REASON_KEY, Orchestrator, ensure_executing, require,
};
use crate::context::RequestContext;
use crate::error::CoreError;
use jaro_rs_protocol::audit::{
    STEP_COMPLETED, STEP_FAILED, TASK_COMPLETED, TASK_FAILED, TASK_PLANNED, TASK_VERIFIED,
};
use jaro_rs_protocol::{Plan, Step, StepResult, StepStatus, Task, TaskStatus};

impl Orchestrator {
    /// Plan a `NEW` task: `NEW -> PLANNING -> EXECUTING`, or `FAILED` when
    /// the planner errors or returns an unusable plan.
    pub async fn plan_task(&self, ctx: &RequestContext, task_id: &str) -> Result<Task, CoreError> {
        require("task_id", task_id)?;
        let task = self.ports.tasks.get_task(ctx, task_id).await?;
        if task.status != TaskStatus::New {
            return Err(CoreError::FailedPrecondition(format!(
                "task {task_id} is {}, expected NEW",
                task.status
            )));
        }
        self.plan(ctx, task_id).await
    }

    /// Advance a task as far as it can go without a human.
    ///
    /// Plans a `NEW` task, then executes steps in order until the task waits
    /// for approval or reaches a terminal state. Waiting and terminal tasks
    /// are returned unchanged. Planner and executor errors fail the task and
    /// are returned; a step that keeps reporting failure fails the task and
    /// the failed task is returned.
    pub async fn run_task(&self, ctx: &RequestContext, task_id: &str) -> Result<Task, CoreError> {
        require("task_id", task_id)?;
        let mut task = self.ports.tasks.get_task(ctx, task_id).await?;
        loop {
            match task.status {
                TaskStatus::WaitingApproval
                | TaskStatus::Done
                | TaskStatus::Failed
                | TaskStatus::Canceled => return Ok(task),
                TaskStatus::Planning => {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {task_id} is already being planned"
                    )));
                }
                TaskStatus::New => {
                    ctx.check()?;
                    task = self.plan(ctx, task_id).await?;
                }
                TaskStatus::Executing => {
                    ctx.check()?;
                    task = match self.advance(ctx, task).await {
                        Err(CoreError::FailedPrecondition(reason)) => {
                            self.reload_after_conflict(ctx, task_id, reason).await?
                        }
                        other => other?,
                    };
                }
                TaskStatus::Verifying => {
                    ctx.check()?;
                    task = self.verify(ctx, task).await?;
                }
            }
        }
    }

    /// A commit guard rejected the engine's write. When someone else parked
    /// or finished the task meanwhile, that newer state wins.
    async fn reload_after_conflict(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        reason: String,
    ) -> Result<Task, CoreError> {
        let task = self.ports.tasks.get_task(ctx, task_id).await?;
        if task.is_finished() || task.status == TaskStatus::WaitingApproval {
            self.ports.logger.info(
                "task changed during execution",
                &[("task_id", task_id), ("status", task.status.as_str())],
            );
            return Ok(task);
        }
        Err(CoreError::FailedPrecondition(reason))
    }

    async fn plan(&self, ctx: &RequestContext, task_id: &str) -> Result<Task, CoreError> {
        let now = self.ports.clock.now();
        let task = self
            .ports
            .tasks
            .update_task(ctx, task_id, &mut |task: &mut Task| {
                if task.status != TaskStatus::New {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} is {}, expected NEW",
                        task.id, task.status
                    )));
                }
                task.transition(TaskStatus::Planning, now)
                    .map_err(CoreError::from)
            })
            .await?;

        let tools = self.ports.tools.list_tools();
        let planned = ctx
            .run(self.ports.planner.create_plan(ctx, &task, &tools))
            .await;
        let validated = planned.and_then(|plan| {
            plan.validate(task_id)?;
            Ok(plan)
        });
        let plan = match validated {
            Ok(plan) => plan,
            Err(err) if err.is_canceled() => {
                self.rollback_planning(ctx, task_id).await;
                return Err(err);
            }
            Err(err) => {
                self.fail(ctx, task_id, &format!("planning failed: {err}"))
                    .await?;
                return Err(err);
            }
        };

        let stored = match ctx.check() {
            Ok(()) => self.ports.plans.save_plan(ctx, &plan).await,
            Err(err) => Err(err),
        };
        match stored {
            Ok(()) => {}
            Err(err) if err.is_canceled() => {
                self.rollback_planning(ctx, task_id).await;
                return Err(err);
            }
            Err(err) => {
                self.fail(ctx, task_id, &format!("plan could not be stored: {err}"))
                    .await?;
                return Err(err);
            }
        }

        // The plan is stored; commit even if the caller has given up.
        let now = self.ports.clock.now();
        let first_step = plan.first_step_id().map(str::to_string);
        let committed = self
            .ports
            .tasks
            .update_task(&ctx.detached(), task_id, &mut |task: &mut Task| {
                if task.status != TaskStatus::Planning {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} left PLANNING while the planner ran (now {})",
                        task.id, task.status
                    )));
                }
                task.transition(TaskStatus::Executing, now)?;
                task.plan_id = Some(plan.id.clone());
                task.current_step_id = first_step.clone();
                if !plan.goal.trim().is_empty() {
                    task.normalized_intent = plan.goal.clone();
                }
                Ok(())
            })
            .await?;

        let step_count = plan.steps.len().to_string();
        self.ports.logger.info(
            "task planned",
            &[
                ("task_id", task_id),
                ("plan_id", &plan.id),
                ("steps", &step_count),
            ],
        );
        let approvals = plan
            .steps
            .iter()
            .filter(|step| step.requires_approval)
            .count();
        let event = self
            .audit_event(ctx, task_id, TASK_PLANNED, ENGINE_ACTOR)
            .with("plan_id", plan.id.clone())
            .with("goal", plan.goal.clone())
            .with("step_count", plan.steps.len())
            .with("approval_steps", approvals)
            .with("risk_summary", plan.risk_summary.clone());
        self.emit(event).await;
        Ok(committed)
    }

    /// Undo `NEW -> PLANNING` after the planning call was canceled.
    async fn rollback_planning(&self, ctx: &RequestContext, task_id: &str) {
        let now = self.ports.clock.now();
        let result = self
            .ports
            .tasks
            .update_task(&ctx.detached(), task_id, &mut |task: &mut Task| {
                if task.status == TaskStatus::Planning {
                    task.transition(TaskStatus::New, now)?;
                }
                Ok(())
            })
            .await;
        match result {
            Ok(_) => self
                .ports
                .logger
                .warn("planning canceled; task rolled back", &[("task_id", task_id)]),
            Err(err) => self.ports.logger.error(
                "planning rollback failed",
                &[("task_id", task_id), ("error", &err.to_string())],
            ),
        }
    }

    /// One unit of progress for an `EXECUTING` task.
    async fn advance(&self, ctx: &RequestContext, task: Task) -> Result<Task, CoreError> {
        let Some(plan_id) = task.plan_id.clone() else {
            let reason = format!("executing task {} has no plan", task.id);
            return self.abort(ctx, &task.id, reason).await;
        };
        let Some(step_id) = task.current_step_id.clone() else {
            return self.finish_execution(ctx, task).await;
        };
        let mut plan = match self.ports.plans.get_plan(ctx, &plan_id).await {
            Ok(plan) => plan,
            Err(CoreError::NotFound(_)) => {
                let reason = format!("plan {plan_id} of task {} is missing", task.id);
                return self.abort(ctx, &task.id, reason).await;
            }
            Err(err) => return Err(err),
        };
        let Some(step) = plan.step(&step_id).cloned() else {
            let reason = format!("step {step_id} missing from plan {plan_id}");
            return self.abort(ctx, &task.id, reason).await;
        };

        if step.status.is_settled() {
            let next = plan.next_step_id(&step_id).map(str::to_string);
            return self.move_to_step(ctx, &task, &step_id, next).await;
        }
        let granted = task.metadata.get(APPROVED_STEP_KEY) == Some(&step.id);
        if step.requires_approval && !granted {
            return self.request_approval(ctx, &task, &step).await;
        }
        self.attempt_step(ctx, task, &mut plan, step).await
    }

    async fn attempt_step(
        &self,
        ctx: &RequestContext,
        task: Task,
        plan: &mut Plan,
        step: Step,
    ) -> Result<Task, CoreError> {
        let attempt = step.retry_count.saturating_add(1);
        set_step(plan, &step.id, |step| {
            step.retry_count = attempt;
            step.status = StepStatus::InProgress;
        });
        self.ports.plans.save_plan(ctx, plan).await?;

        let executed = ctx
            .run(self.ports.executor.execute_step(ctx, &task, &step))
            .await;
        match executed {
            Err(err) if err.is_canceled() => {
                set_step(plan, &step.id, |step| step.status = StepStatus::Pending);
                self.save_plan_quietly(ctx, plan, &task.id).await;
                self.ports.logger.warn(
                    "step execution canceled",
                    &[("task_id", &task.id), ("step_id", &step.id)],
                );
                Err(err)
            }
            Err(err) => {
                let reason = format!("executor error on step {}: {err}", step.id);
                self.step_failed(ctx, &task, plan, &step, attempt, &reason)
                    .await?;
                Err(err)
            }
            Ok(result) if result.success => {
                self.step_succeeded(ctx, &task, plan, &step, attempt, result)
                    .await
            }
            Ok(result) => {
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "step reported failure".to_string());
                let committed = self.record_usage(ctx, &task, &step.id, &result).await?;
                if attempt <= self.config.max_step_retries {
                    set_step(plan, &step.id, |step| step.status = StepStatus::Pending);
                    self.ports.plans.save_plan(ctx, plan).await?;
                    self.ports.logger.warn(
                        "step failed; retrying",
                        &[
                            ("task_id", &task.id),
                            ("step_id", &step.id),
                            ("attempt", &attempt.to_string()),
                            ("error", &message),
                        ],
                    );
                    return Ok(committed);
                }
                let reason = format!(
                    "step {} failed after {attempt} attempt(s): {message}",
                    step.id
                );
                self.step_failed(ctx, &committed, plan, &step, attempt, &reason)
                    .await
            }
        }
    }

    async fn step_succeeded(
        &self,
        ctx: &RequestContext,
        task: &Task,
        plan: &mut Plan,
        step: &Step,
        attempt: u32,
        result: StepResult,
    ) -> Result<Task, CoreError> {
        let next = plan.next_step_id(&step.id).map(str::to_string);
        let now = self.ports.clock.now();
        let committed = self
            .ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                ensure_executing(task, &step.id)?;
                task.artifacts
                    .insert(step.id.clone(), result.output.clone());
                task.record_usage(result.usage_tokens, result.cost);
                if task.metadata.get(APPROVED_STEP_KEY) == Some(&step.id) {
                    task.metadata.remove(APPROVED_STEP_KEY);
                }
                task.current_step_id = next.clone();
                task.updated_at = now;
                Ok(())
            })
            .await;
        let committed = match committed {
            Ok(committed) => committed,
            Err(err) => {
                // The task never recorded this step's output.
                set_step(plan, &step.id, |step| step.status = StepStatus::Pending);
                self.save_plan_quietly(ctx, plan, &task.id).await;
                return Err(err);
            }
        };

        set_step(plan, &step.id, |step| {
            step.status = StepStatus::Completed;
            step.result_ref = Some(step.id.clone());
        });
        self.ports.plans.save_plan(&ctx.detached(), plan).await?;

        self.ports.logger.info(
            "step completed",
            &[
                ("task_id", &task.id),
                ("step_id", &step.id),
                ("attempt", &attempt.to_string()),
            ],
        );
        let event = self
            .audit_event(ctx, &task.id, STEP_COMPLETED, ENGINE_ACTOR)
            .with("step_id", step.id.clone())
            .with("step_type", step.step_type.as_str())
            .with("attempt", attempt)
            .with("duration_ms", result.duration_ms)
            .with("usage_tokens", result.usage_tokens);
        self.emit(event).await;
        Ok(committed)
    }

    async fn step_failed(
        &self,
        ctx: &RequestContext,
        task: &Task,
        plan: &mut Plan,
        step: &Step,
        attempt: u32,
        reason: &str,
    ) -> Result<Task, CoreError> {
        set_step(plan, &step.id, |step| step.status = StepStatus::Failed);
        self.save_plan_quietly(ctx, plan, &task.id).await;
        let event = self
            .audit_event(ctx, &task.id, STEP_FAILED, ENGINE_ACTOR)
            .with("step_id", step.id.clone())
            .with("attempt", attempt)
            .with("error", reason);
        self.emit(event).await;
        self.fail(ctx, &task.id, reason).await
    }

    /// Fold accounting from a failed attempt into the task.
    async fn record_usage(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step_id: &str,
        result: &StepResult,
    ) -> Result<Task, CoreError> {
        let now = self.ports.clock.now();
        self.ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                ensure_executing(task, step_id)?;
                task.record_usage(result.usage_tokens, result.cost);
                task.updated_at = now;
                Ok(())
            })
            .await
    }

    /// Point the task at `next` after `step_id` settled without running.
    async fn move_to_step(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step_id: &str,
        next: Option<String>,
    ) -> Result<Task, CoreError> {
        let now = self.ports.clock.now();
        self.ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                ensure_executing(task, step_id)?;
                task.current_step_id = next.clone();
                task.updated_at = now;
                Ok(())
            })
            .await
    }

    /// All steps ran: verify, or complete directly when verification is off.
    async fn finish_execution(&self, ctx: &RequestContext, task: Task) -> Result<Task, CoreError> {
        let target = if self.config.verify_on_completion {
            TaskStatus::Verifying
        } else {
            TaskStatus::Done
        };
        let now = self.ports.clock.now();
        let committed = self
            .ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                if task.status != TaskStatus::Executing || task.current_step_id.is_some() {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} still has work pending",
                        task.id
                    )));
                }
                task.transition(target, now).map_err(CoreError::from)
            })
            .await?;
        if committed.status == TaskStatus::Done {
            self.completed(ctx, &committed).await;
        }
        Ok(committed)
    }

    /// `VERIFYING -> DONE` when every step completed or was skipped.
    async fn verify(&self, ctx: &RequestContext, task: Task) -> Result<Task, CoreError> {
        let plan = match task.plan_id.as_deref() {
            Some(plan_id) => self.ports.plans.get_plan(ctx, plan_id).await?,
            None => {
                return self
                    .fail(ctx, &task.id, "verification failed: task has no plan")
                    .await;
            }
        };
        let unsettled: Vec<&str> = plan
            .steps
            .iter()
            .filter(|step| !step.status.is_settled())
            .map(|step| step.id.as_str())
            .collect();
        if !unsettled.is_empty() {
            let reason = format!(
                "verification failed: steps not completed: {}",
                unsettled.join(", ")
            );
            return self.fail(ctx, &task.id, &reason).await;
        }

        let now = self.ports.clock.now();
        let committed = self
            .ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                if task.status != TaskStatus::Verifying {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} is {}, expected VERIFYING",
                        task.id, task.status
                    )));
                }
                task.transition(TaskStatus::Done, now)
                    .map_err(CoreError::from)
            })
            .await?;

        let event = self
            .audit_event(ctx, &task.id, TASK_VERIFIED, ENGINE_ACTOR)
            .with("plan_id", plan.id.clone())
            .with("step_count", plan.steps.len());
        self.emit(event).await;
        self.completed(ctx, &committed).await;
        Ok(committed)
    }

    async fn completed(&self, ctx: &RequestContext, task: &Task) {
        let tokens = task.usage_tokens.to_string();
        self.ports
            .logger
            .info("task completed", &[("task_id", &task.id), ("usage_tokens", &tokens)]);
        let event = self
            .audit_event(ctx, &task.id, TASK_COMPLETED, ENGINE_ACTOR)
            .with("usage_tokens", task.usage_tokens)
            .with("cost_estimate", task.cost_estimate)
            .with("artifacts", task.artifacts.len());
        self.emit(event).await;
    }

    /// Move a live task to `FAILED`, recording `reason`.
    ///
    /// Runs detached from the caller's cancellation so a failure observed
    /// late in a request is still recorded.
    async fn fail(&self, ctx: &RequestContext, task_id: &str, reason: &str) -> Result<Task, CoreError> {
        let now = self.ports.clock.now();
        let committed = self
            .ports
            .tasks
            .update_task(&ctx.detached(), task_id, &mut |task: &mut Task| {
                task.transition(TaskStatus::Failed, now)?;
                task.metadata.remove(APPROVED_STEP_KEY);
                task.metadata
                    .insert(FAILURE_REASON_KEY.to_string(), reason.to_string());
                Ok(())
            })
            .await?;

        self.ports
            .logger
            .error("task failed", &[("task_id", task_id), ("reason", reason)]);
        let event = self
            .audit_event(ctx, task_id, TASK_FAILED, ENGINE_ACTOR)
            .with("reason", reason);
        self.emit(event).await;
        Ok(committed)
    }

    /// Fail the task for an unrecoverable inconsistency and report it.
    async fn abort(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        reason: String,
    ) -> Result<Task, CoreError> {
        self.fail(ctx, task_id, &reason).await?;
        Err(CoreError::Fatal(reason))
    }

    async fn save_plan_quietly(&self, ctx: &RequestContext, plan: &Plan, task_id: &str) {
        if let Err(err) = self.ports.plans.save_plan(&ctx.detached(), plan).await {
            self.ports.logger.warn(
                "plan update failed",
                &[
                    ("task_id", task_id),
                    ("plan_id", &plan.id),
                    ("error", &err.to_string()),
                ],
            );
        }
    }
}

fn set_step(plan: &mut Plan, step_id: &str, update: impl FnOnce(&mut Step)) {
    if let Some(step) = plan.step_mut(step_id) {
        update(step);
    }
}
