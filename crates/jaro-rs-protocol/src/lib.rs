//! Data model shared by the JARO orchestration engine, its ports, and its
//! driving adapters.
//!
//! Everything in this crate is a passive record: the engine in `jaro-rs-core`
//! is the only component that moves a task through its lifecycle.

mod approval;
pub mod audit;
mod plan;
mod task;
mod tool;

pub use approval::{ApprovalRequest, ApprovalStatus};
pub use audit::AuditEvent;
pub use plan::{Plan, PlanValidationError, RiskLevel, Step, StepStatus, StepType};
pub use task::{Task, TaskStatus, TransitionError};
pub use tool::{StepResult, Tool, ToolFailure, ToolMetadata};

/// Identifier for a task.
pub type TaskId = String;
/// Identifier for a step, unique within its plan.
pub type StepId = String;
/// Identifier for a plan.
pub type PlanId = String;
