//! Audit sinks.

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::ports::AuditRepository;
use async_trait::async_trait;
use jaro_rs_protocol::AuditEvent;
use log::info;
use parking_lot::RwLock;

/// Keeps every event in memory, queryable by task.
#[derive(Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in emission order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    pub fn events_for_task(&self, task_id: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Event types recorded for `task_id`, in order.
    pub fn event_types_for_task(&self, task_id: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|event| event.task_id == task_id)
            .map(|event| event.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn save_event(&self, _ctx: &RequestContext, event: &AuditEvent) -> Result<(), CoreError> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

/// Writes one JSON line per event to the `jaro::audit` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditRepository;

impl LogAuditRepository {
    pub const TARGET: &'static str = "jaro::audit";
}

#[async_trait]
impl AuditRepository for LogAuditRepository {
    async fn save_event(&self, _ctx: &RequestContext, event: &AuditEvent) -> Result<(), CoreError> {
        let line = serde_json::to_string(event)
            .map_err(|err| CoreError::Fatal(format!("encode audit event: {err}")))?;
        info!(target: Self::TARGET, "{line}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryAuditRepository, LogAuditRepository};
    use crate::context::RequestContext;
    use crate::ports::AuditRepository;
    use chrono::Utc;
    use jaro_rs_protocol::AuditEvent;
    use jaro_rs_protocol::audit::{TASK_CREATED, TASK_PLANNED};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn in_memory_filters_by_task() {
        let repo = InMemoryAuditRepository::new();
        let ctx = RequestContext::new();
        for (id, task, kind) in [
            ("e1", "t1", TASK_CREATED),
            ("e2", "t2", TASK_CREATED),
            ("e3", "t1", TASK_PLANNED),
        ] {
            let event = AuditEvent::new(id, task, kind, "engine", Utc::now());
            repo.save_event(&ctx, &event).await.expect("save");
        }
        assert_eq!(repo.events().len(), 3);
        assert_eq!(
            repo.event_types_for_task("t1"),
            vec![TASK_CREATED.to_string(), TASK_PLANNED.to_string()]
        );
        assert_eq!(repo.events_for_task("t2")[0].id, "e2");
    }

    #[tokio::test]
    async fn log_sink_accepts_events() {
        let event = AuditEvent::new("e1", "t1", TASK_CREATED, "user-42", Utc::now())
            .with("input", "book a flight");
        LogAuditRepository
            .save_event(&RequestContext::new(), &event)
            .await
            .expect("save");
    }
}
