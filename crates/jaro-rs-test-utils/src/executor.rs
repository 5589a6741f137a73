use async_trait::async_trait;
use jaro_rs_core::{CoreError, Executor, RequestContext};
use jaro_rs_protocol::{Step, StepResult, Task};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
enum Outcome {
    Success(String),
    Failure(String),
    Error(CoreError),
}

/// Executor that replays queued outcomes, then succeeds with `"ok"`.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(self, output: impl Into<String>) -> Self {
        self.outcomes.lock().push_back(Outcome::Success(output.into()));
        self
    }

    /// Queue a logical failure (`success = false`).
    pub fn push_failure(self, message: impl Into<String>) -> Self {
        self.outcomes.lock().push_back(Outcome::Failure(message.into()));
        self
    }

    /// Queue an infrastructure error.
    pub fn push_error(self, error: CoreError) -> Self {
        self.outcomes.lock().push_back(Outcome::Error(error));
        self
    }

    /// Step ids in the order they were executed.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute_step(
        &self,
        _ctx: &RequestContext,
        _task: &Task,
        step: &Step,
    ) -> Result<StepResult, CoreError> {
        self.calls.lock().push(step.id.clone());
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Outcome::Success("ok".to_string()));
        match outcome {
            Outcome::Success(output) => {
                Ok(StepResult::success(&step.id, output, 1).with_usage(10, 0.01))
            }
            Outcome::Failure(message) => {
                Ok(StepResult::failure(&step.id, message, 1).with_usage(5, 0.0))
            }
            Outcome::Error(error) => Err(error),
        }
    }
}

/// Executor that parks every call until released.
#[derive(Debug, Default)]
pub struct BlockingExecutor {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl BlockingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once a call has entered the executor.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one parked call finish successfully.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Executor for BlockingExecutor {
    async fn execute_step(
        &self,
        _ctx: &RequestContext,
        _task: &Task,
        step: &Step,
    ) -> Result<StepResult, CoreError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(StepResult::success(&step.id, "released", 0))
    }
}
