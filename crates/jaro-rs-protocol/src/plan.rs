//! Plan and step records.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Think,
    ToolCall,
    Decision,
    ApprovalGate,
    Verify,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Think => "THINK",
            StepType::ToolCall => "TOOL_CALL",
            StepType::Decision => "DECISION",
            StepType::ApprovalGate => "APPROVAL_GATE",
            StepType::Verify => "VERIFY",
        }
    }
}

/// Progress of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::InProgress => "IN_PROGRESS",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }

    /// Completed or skipped: nothing left to do for this step.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

/// Risk classification of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::High => "HIGH",
        }
    }
}

/// One atomic unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Stored explicitly so policy can override what the risk level implies.
    #[serde(default)]
    pub requires_approval: bool,
    /// Attempts made so far. Never decremented.
    #[serde(default)]
    pub retry_count: u32,
    /// Key of the task artifact holding this step's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
}

impl Step {
    /// Create a pending, low-risk step. Approval gates always require approval.
    pub fn new(id: impl Into<String>, title: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            step_type,
            status: StepStatus::Pending,
            tool_name: None,
            tool_input: String::new(),
            risk_level: RiskLevel::Low,
            requires_approval: step_type == StepType::ApprovalGate,
            retry_count: 0,
            result_ref: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>, input: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self.tool_input = input.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.tool_input = input.into();
        self
    }

    /// Set the risk level; HIGH risk implies approval.
    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self.requires_approval = self.requires_approval || risk_level == RiskLevel::High;
        self
    }

    /// Policy override for the approval requirement.
    pub fn with_requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }
}

/// Reasons a planner output cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("plan has no steps")]
    Empty,
    #[error("plan belongs to task {actual}, expected {expected}")]
    TaskMismatch { expected: String, actual: String },
    #[error("plan contains a step with an empty id")]
    EmptyStepId,
    #[error("duplicate step id in plan: {0}")]
    DuplicateStep(String),
}

/// Ordered steps produced for exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub task_id: String,
    #[serde(default)]
    pub goal: String,
    pub steps: Vec<Step>,
    /// Human-readable and advisory only.
    #[serde(default)]
    pub risk_summary: String,
}

impl Plan {
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|step| step.id == step_id)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    pub fn first_step_id(&self) -> Option<&str> {
        self.steps.first().map(|step| step.id.as_str())
    }

    /// Id of the step that runs after `step_id`, if any.
    pub fn next_step_id(&self, step_id: &str) -> Option<&str> {
        let index = self.step_index(step_id)?;
        self.steps.get(index + 1).map(|step| step.id.as_str())
    }

    /// Every step is completed or skipped.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|step| step.status.is_settled())
    }

    /// Check the structural invariants the engine relies on.
    pub fn validate(&self, task_id: &str) -> Result<(), PlanValidationError> {
        if self.task_id != task_id {
            return Err(PlanValidationError::TaskMismatch {
                expected: task_id.to_string(),
                actual: self.task_id.clone(),
            });
        }
        if self.steps.is_empty() {
            return Err(PlanValidationError::Empty);
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(PlanValidationError::EmptyStepId);
            }
            if !seen.insert(step.id.as_str()) {
                return Err(PlanValidationError::DuplicateStep(step.id.clone()));
            }
        }
        Ok(())
    }
}
