use jaro_rs_config::{JaroConfig, ServerConfig};
use jaro_rs_core::memory::LogAuditRepository;
use jaro_rs_core::{EnginePorts, Orchestrator, RequestContext};
use std::sync::Arc;
use std::time::Duration;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, server: ServerConfig) -> Self {
        Self {
            orchestrator,
            server: Arc::new(server),
        }
    }

    /// In-memory engine wired from `config`, auditing to the log.
    pub fn from_config(config: &JaroConfig) -> Self {
        let ports = EnginePorts::in_memory().with_audit(Arc::new(LogAuditRepository));
        let orchestrator = Orchestrator::new(config.engine.clone(), ports);
        Self::new(Arc::new(orchestrator), config.server.clone())
    }

    /// Context bounded by the configured request timeout.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(Duration::from_secs(self.server.request_timeout_secs))
    }

    pub fn auto_run(&self) -> bool {
        self.orchestrator.config().auto_run
    }
}
