//! Immutable audit facts emitted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema tag stamped on events unless configured otherwise.
pub const DEFAULT_BEHAVIOR_VERSION: &str = "v1";

pub const TASK_CREATED: &str = "TASK_CREATED";
pub const TASK_PLANNED: &str = "TASK_PLANNED";
pub const APPROVAL_REQUESTED: &str = "APPROVAL_REQUESTED";
pub const APPROVAL_DECISION: &str = "APPROVAL_DECISION";
pub const STEP_COMPLETED: &str = "STEP_COMPLETED";
pub const STEP_FAILED: &str = "STEP_FAILED";
pub const TASK_VERIFIED: &str = "TASK_VERIFIED";
pub const TASK_COMPLETED: &str = "TASK_COMPLETED";
pub const TASK_FAILED: &str = "TASK_FAILED";
pub const TASK_CANCELED: &str = "TASK_CANCELED";

/// Write-once record of a significant engine action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub task_id: String,
    /// Defaults to the task id.
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub actor: String,
    pub behavior_version: String,
}

impl AuditEvent {
    pub fn new(
        id: impl Into<String>,
        task_id: impl Into<String>,
        event_type: impl Into<String>,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let task_id = task_id.into();
        Self {
            id: id.into(),
            correlation_id: task_id.clone(),
            task_id,
            timestamp,
            event_type: event_type.into(),
            payload: Map::new(),
            actor: actor.into(),
            behavior_version: DEFAULT_BEHAVIOR_VERSION.to_string(),
        }
    }

    /// Add a payload entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_behavior_version(mut self, version: impl Into<String>) -> Self {
        self.behavior_version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditEvent, TASK_CREATED};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn correlation_defaults_to_task_id() {
        let event = AuditEvent::new("e1", "t1", TASK_CREATED, "user-42", Utc::now())
            .with("input", "book a flight")
            .with("approved", true);
        assert_eq!(event.correlation_id, "t1");
        assert_eq!(event.behavior_version, "v1");
        assert_eq!(event.payload.get("approved"), Some(&json!(true)));

        let event = event.with_correlation_id("req-9").with_behavior_version("v2");
        assert_eq!(event.correlation_id, "req-9");
        assert_eq!(event.behavior_version, "v2");
    }
}
