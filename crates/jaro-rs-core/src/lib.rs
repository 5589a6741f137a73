//! Core orchestration engine for JARO.
//!
//! This crate owns the task lifecycle engine, the ports it drives, and the
//! in-memory reference adapters used by the server and tests.

pub mod context;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod ports;

pub use context::RequestContext;
pub use error::{CoreError, ErrorKind};
/// Engine facade and the task metadata keys it maintains.
pub use orchestrator::{
    APPROVED_STEP_KEY, CANCELED_BY_KEY, ENGINE_ACTOR, EnginePorts, FAILURE_REASON_KEY,
    Orchestrator,
};
/// Port contracts.
pub use ports::{
    ApprovalRepository, AuditRepository, Clock, Executor, IdGenerator, Logger, PlanRepository,
    Planner, TaskMutation, TaskRepository, ToolRegistry,
};
