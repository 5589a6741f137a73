use async_trait::async_trait;
use jaro_rs_core::{AuditRepository, CoreError, RequestContext};
use jaro_rs_protocol::AuditEvent;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Audit sink that rejects every write.
#[derive(Debug, Default)]
pub struct FailingAuditRepository {
    attempts: AtomicUsize,
}

impl FailingAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditRepository for FailingAuditRepository {
    async fn save_event(&self, _ctx: &RequestContext, _event: &AuditEvent) -> Result<(), CoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::Unavailable("audit store offline".to_string()))
    }
}
