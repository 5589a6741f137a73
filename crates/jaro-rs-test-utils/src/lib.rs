//! Test helpers shared across JARO crates.

pub mod audit;
pub mod executor;
pub mod logger;
pub mod planner;
pub mod plans;
pub mod system;
pub mod tools;

pub use audit::FailingAuditRepository;
pub use executor::{BlockingExecutor, ScriptedExecutor};
pub use logger::{LogLine, RecordingLogger};
pub use planner::{CancelingPlanner, FailingPlanner, ScriptedPlanner, StalledPlanner};
pub use plans::{CancelAfterSavePlanRepository, ForgetfulPlanRepository};
pub use system::{FixedClock, SequentialIdGenerator};
pub use tools::StubTool;
