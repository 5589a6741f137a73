//! In-process reference implementations of every port.
//!
//! These adapters back the default server and the test suites. They keep all
//! state in memory and lose it on restart.

mod audit;
mod executor;
mod planner;
mod stores;
mod system;
mod task_repo;
mod tools;

pub use audit::{InMemoryAuditRepository, LogAuditRepository};
pub use executor::NaiveExecutor;
pub use planner::{MOCK_TOOL_NAME, NaivePlanner};
pub use stores::{InMemoryApprovalRepository, InMemoryPlanRepository};
pub use system::{LogLogger, SystemClock, UuidGenerator, format_fields};
pub use task_repo::InMemoryTaskRepository;
pub use tools::{EchoTool, InMemoryToolRegistry};
