//! Best-effort audit emission.

use super::Orchestrator;
use crate::context::RequestContext;
use jaro_rs_protocol::AuditEvent;

impl Orchestrator {
    /// Event stamped with a fresh id, the clock, the configured behavior
    /// version and the request correlation id (falling back to the task id).
    pub(super) fn audit_event(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        event_type: &str,
        actor: &str,
    ) -> AuditEvent {
        let event = AuditEvent::new(
            self.ports.ids.new_id(),
            task_id,
            event_type,
            actor,
            self.ports.clock.now(),
        )
        .with_behavior_version(self.config.behavior_version.clone());
        match ctx.correlation_id() {
            Some(correlation_id) => event.with_correlation_id(correlation_id),
            None => event,
        }
    }

    /// Persist `event`; failures are logged at warn and swallowed.
    ///
    /// Runs detached from the caller's cancellation: the change being
    /// recorded has already been committed.
    pub(super) async fn emit(&self, event: AuditEvent) {
        let ctx = RequestContext::new();
        if let Err(err) = self.ports.audit.save_event(&ctx, &event).await {
            self.ports.logger.warn(
                "audit write failed",
                &[
                    ("task_id", &event.task_id),
                    ("event_type", &event.event_type),
                    ("error", &err.to_string()),
                ],
            );
        }
    }
}
