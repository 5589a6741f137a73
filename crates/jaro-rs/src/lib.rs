//! Public SDK surface for JARO.
//!
//! This crate re-exports the engine building blocks and provides small
//! helpers to keep consumer setup consistent.

/// Re-export for convenience.
pub use jaro_rs_config as config;
pub use jaro_rs_core as core;
/// Re-export for convenience.
pub use jaro_rs_protocol as protocol;
/// Re-export for convenience.
pub use jaro_rs_server as server;
pub use jaro_rs_server::init_logging;

use jaro_rs_config::JaroConfig;
use jaro_rs_core::{EnginePorts, Orchestrator};
use log::debug;

/// Engine over the in-memory reference adapters, with the engine policy
/// from `config`.
pub fn in_memory_orchestrator(config: &JaroConfig) -> Orchestrator {
    debug!(
        "building in-memory orchestrator (max_step_retries={}, verify_on_completion={})",
        config.engine.max_step_retries, config.engine.verify_on_completion
    );
    Orchestrator::new(config.engine.clone(), EnginePorts::in_memory())
}

#[cfg(test)]
mod tests {
    use super::in_memory_orchestrator;
    use jaro_rs_config::JaroConfig;
    use jaro_rs_core::RequestContext;
    use jaro_rs_protocol::TaskStatus;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn in_memory_orchestrator_uses_engine_config() {
        let mut config = JaroConfig::default();
        config.engine.default_channel = "cli".to_string();
        let engine = in_memory_orchestrator(&config);
        let ctx = RequestContext::new();

        let task = engine
            .start_task(&ctx, "echo hello", "user-42")
            .await
            .expect("start");
        assert_eq!(task.channel, "cli");
        let done = engine.run_task(&ctx, &task.id).await.expect("run");
        assert_eq!(done.status, TaskStatus::Done);
    }
}
