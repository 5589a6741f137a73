//! Pending human decisions.

use crate::plan::{RiskLevel, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    Open,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Open => "OPEN",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

/// Request for a human decision on the step currently gating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub task_id: String,
    pub step_id: String,
    pub action_summary: String,
    pub risk_reason: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Open a request for `step`, deriving the summary and reason from it.
    pub fn open(
        id: impl Into<String>,
        task_id: impl Into<String>,
        step: &Step,
        now: DateTime<Utc>,
    ) -> Self {
        let action_summary = match step.tool_name.as_deref() {
            Some(tool) => format!("{} (tool: {tool})", step.title),
            None => step.title.clone(),
        };
        let risk_reason = match step.risk_level {
            RiskLevel::High => format!("step '{}' is classified as HIGH risk", step.title),
            RiskLevel::Low => format!("step '{}' requires explicit approval", step.title),
        };
        Self {
            id: id.into(),
            task_id: task_id.into(),
            step_id: step.id.clone(),
            action_summary,
            risk_reason,
            status: ApprovalStatus::Open,
            approved_by: None,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ApprovalStatus::Open
    }

    /// Record the decision. Returns `false` if the request was already resolved.
    pub fn resolve(&mut self, approved: bool, decided_by: &str, now: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.approved_by = Some(decided_by.to_string());
        self.resolved_at = Some(now);
        true
    }
}
