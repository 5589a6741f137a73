//! Approval gate protocol.

use super::{APPROVED_STEP_KEY, ENGINE_ACTOR, Orchestrator, ensure_executing, require};
use crate::context::RequestContext;
use crate::error::CoreError;
use jaro_rs_protocol::audit::{APPROVAL_DECISION, APPROVAL_REQUESTED};
use jaro_rs_protocol::{ApprovalRequest, Step, StepStatus, Task, TaskStatus};

impl Orchestrator {
    /// Apply a human decision to the step a task is waiting on.
    ///
    /// The status check and the transition run inside one atomic
    /// `update_task`, so of several racing decisions exactly one commits and
    /// the rest fail with `FailedPrecondition`. Approving resumes the task in
    /// `EXECUTING` with the step marked granted; rejecting cancels it.
    pub async fn handle_approval(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        step_id: &str,
        approved: bool,
        user_id: &str,
    ) -> Result<Task, CoreError> {
        require("task_id", task_id)?;
        require("step_id", step_id)?;
        require("user_id", user_id)?;
        let now = self.ports.clock.now();

        let task = self
            .ports
            .tasks
            .update_task(ctx, task_id, &mut |task: &mut Task| {
                if task.status != TaskStatus::WaitingApproval {
                    return Err(CoreError::FailedPrecondition(format!(
                        "task {} is {}, not WAITING_APPROVAL",
                        task.id, task.status
                    )));
                }
                if !task.is_current_step(step_id) {
                    return Err(CoreError::FailedPrecondition(format!(
                        "step {step_id} is not awaiting approval on task {}",
                        task.id
                    )));
                }
                if approved {
                    task.transition(TaskStatus::Executing, now)?;
                    task.metadata
                        .insert(APPROVED_STEP_KEY.to_string(), step_id.to_string());
                } else {
                    task.transition(TaskStatus::Canceled, now)?;
                    task.metadata.remove(APPROVED_STEP_KEY);
                }
                Ok(())
            })
            .await?;

        // The decision is committed; the follow-ups below only project it.
        let follow_up = ctx.detached();
        let approval_id = self
            .archive_decision(&follow_up, task_id, step_id, approved, user_id)
            .await;
        if !approved {
            self.mark_step(&follow_up, &task, step_id, StepStatus::Skipped)
                .await;
        }

        self.ports.logger.info(
            "approval decided",
            &[
                ("task_id", task_id),
                ("step_id", step_id),
                ("approved", if approved { "true" } else { "false" }),
                ("user_id", user_id),
            ],
        );
        let mut event = self
            .audit_event(ctx, task_id, APPROVAL_DECISION, user_id)
            .with("step_id", step_id)
            .with("approved", approved)
            .with("task_status", task.status.as_str());
        if let Some(approval_id) = approval_id {
            event = event.with("approval_id", approval_id);
        }
        self.emit(event).await;
        Ok(task)
    }

    /// Park an executing task on `step` until a human decides.
    pub(super) async fn request_approval(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step: &Step,
    ) -> Result<Task, CoreError> {
        let now = self.ports.clock.now();
        let approval = ApprovalRequest::open(self.ports.ids.new_id(), &task.id, step, now);
        self.ports.approvals.save_approval(ctx, &approval).await?;

        let committed = self
            .ports
            .tasks
            .update_task(ctx, &task.id, &mut |task: &mut Task| {
                ensure_executing(task, &step.id)?;
                task.transition(TaskStatus::WaitingApproval, now)
                    .map_err(CoreError::from)
            })
            .await?;

        self.ports.logger.info(
            "approval requested",
            &[
                ("task_id", &task.id),
                ("step_id", &step.id),
                ("approval_id", &approval.id),
            ],
        );
        let event = self
            .audit_event(ctx, &task.id, APPROVAL_REQUESTED, ENGINE_ACTOR)
            .with("step_id", step.id.clone())
            .with("approval_id", approval.id.clone())
            .with("action_summary", approval.action_summary.clone())
            .with("risk_reason", approval.risk_reason.clone())
            .with("risk_level", step.risk_level.as_str());
        self.emit(event).await;
        Ok(committed)
    }

    /// Resolve the stored request for the decided step. Returns its id.
    async fn archive_decision(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        step_id: &str,
        approved: bool,
        user_id: &str,
    ) -> Option<String> {
        let mut approval = match self.ports.approvals.get_approval(ctx, task_id, step_id).await {
            Ok(approval) => approval,
            Err(err) => {
                self.ports.logger.warn(
                    "approval request unavailable for archiving",
                    &[
                        ("task_id", task_id),
                        ("step_id", step_id),
                        ("error", &err.to_string()),
                    ],
                );
                return None;
            }
        };
        if approval.resolve(approved, user_id, self.ports.clock.now()) {
            if let Err(err) = self.ports.approvals.save_approval(ctx, &approval).await {
                self.ports.logger.warn(
                    "approval archive failed",
                    &[
                        ("task_id", task_id),
                        ("approval_id", &approval.id),
                        ("error", &err.to_string()),
                    ],
                );
            }
        }
        Some(approval.id)
    }

    /// Best-effort status update of one plan step.
    pub(super) async fn mark_step(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step_id: &str,
        status: StepStatus,
    ) {
        let Some(plan_id) = task.plan_id.as_deref() else {
            return;
        };
        let result = async {
            let mut plan = self.ports.plans.get_plan(ctx, plan_id).await?;
            if let Some(step) = plan.step_mut(step_id) {
                step.status = status;
            }
            self.ports.plans.save_plan(ctx, &plan).await
        }
        .await;
        if let Err(err) = result {
            self.ports.logger.warn(
                "plan step update failed",
                &[
                    ("task_id", &task.id),
                    ("step_id", step_id),
                    ("status", status.as_str()),
                    ("error", &err.to_string()),
                ],
            );
        }
    }
}
