//! Task record and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Channel assigned to tasks created through the API.
pub const DEFAULT_CHANNEL: &str = "api";
/// Agent that handles tasks unless routed elsewhere.
pub const DEFAULT_TARGET_AGENT: &str = "CORE";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet planned.
    New,
    /// Planner is producing a plan.
    Planning,
    /// Steps are being executed.
    Executing,
    /// Execution is paused on an approval gate.
    WaitingApproval,
    /// All steps ran; the engine is checking the outcome.
    Verifying,
    /// Finished successfully.
    Done,
    /// Finished with an unrecoverable error.
    Failed,
    /// Stopped by a user or a rejected approval.
    Canceled,
}

impl TaskStatus {
    /// Return the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::Planning => "PLANNING",
            TaskStatus::Executing => "EXECUTING",
            TaskStatus::WaitingApproval => "WAITING_APPROVAL",
            TaskStatus::Verifying => "VERIFYING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
        }
    }

    /// Whether no further status change is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `FAILED` and `CANCELED` are reachable from every non-terminal state.
    /// `PLANNING -> NEW` only exists to roll back a planning call that was
    /// canceled before it produced a plan.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, TaskStatus::Failed | TaskStatus::Canceled) {
            return true;
        }
        matches!(
            (self, next),
            (TaskStatus::New, TaskStatus::Planning)
                | (TaskStatus::Planning, TaskStatus::Executing)
                | (TaskStatus::Planning, TaskStatus::New)
                | (TaskStatus::Executing, TaskStatus::WaitingApproval)
                | (TaskStatus::Executing, TaskStatus::Verifying)
                | (TaskStatus::Executing, TaskStatus::Done)
                | (TaskStatus::WaitingApproval, TaskStatus::Executing)
                | (TaskStatus::Verifying, TaskStatus::Done)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "NEW" => Ok(TaskStatus::New),
            "PLANNING" => Ok(TaskStatus::Planning),
            "EXECUTING" => Ok(TaskStatus::Executing),
            "WAITING_APPROVAL" => Ok(TaskStatus::WaitingApproval),
            "VERIFYING" => Ok(TaskStatus::Verifying),
            "DONE" => Ok(TaskStatus::Done),
            "FAILED" => Ok(TaskStatus::Failed),
            "CANCELED" => Ok(TaskStatus::Canceled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One user-submitted unit of work tracked end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once the task reaches a terminal status.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    /// Raw user request; never changes after creation.
    pub input: String,
    /// Starts equal to `input`, refined from the plan goal.
    pub normalized_intent: String,
    pub user_id: String,
    pub channel: String,
    #[serde(default)]
    pub role: String,
    pub target_agent: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub current_step_id: Option<String>,
    #[serde(default)]
    pub artifacts: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub usage_tokens: u64,
    #[serde(default)]
    pub cost_estimate: f64,
}

impl Task {
    /// Build a task in `NEW` with the default routing metadata.
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let input = input.into();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            finished_at: None,
            status: TaskStatus::New,
            normalized_intent: input.clone(),
            input,
            user_id: user_id.into(),
            channel: DEFAULT_CHANNEL.to_string(),
            role: String::new(),
            target_agent: DEFAULT_TARGET_AGENT.to_string(),
            plan_id: None,
            current_step_id: None,
            artifacts: HashMap::new(),
            metadata: HashMap::new(),
            usage_tokens: 0,
            cost_estimate: 0.0,
        }
    }

    /// Move to `next`, stamping `updated_at` (and `finished_at` for terminal
    /// states).
    pub fn transition(
        &mut self,
        next: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Whether the task has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether `step_id` is the step currently gating or running.
    pub fn is_current_step(&self, step_id: &str) -> bool {
        self.current_step_id.as_deref() == Some(step_id)
    }

    /// Add accounting from a step. Both counters only grow.
    pub fn record_usage(&mut self, tokens: u64, cost: f64) {
        self.usage_tokens = self.usage_tokens.saturating_add(tokens);
        if cost.is_finite() && cost > 0.0 {
            self.cost_estimate += cost;
        }
    }
}
