//! Reference executor backed by the tool registry.

use super::planner::MOCK_TOOL_NAME;
use crate::context::RequestContext;
use crate::error::CoreError;
use crate::ports::{Executor, ToolRegistry};
use async_trait::async_trait;
use jaro_rs_protocol::{Step, StepResult, StepType, Task};
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs `TOOL_CALL` steps through registered tools; every other step type
/// succeeds with a descriptive output.
pub struct NaiveExecutor {
    tools: Arc<dyn ToolRegistry>,
    delay: Duration,
}

impl NaiveExecutor {
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self {
            tools,
            delay: Duration::ZERO,
        }
    }

    /// Simulated latency before each step. Cancellation interrupts it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn run_tool(&self, step: &Step) -> Result<String, String> {
        let name = step
            .tool_name
            .as_deref()
            .ok_or_else(|| "tool call step has no tool name".to_string())?;
        match self.tools.get_tool(name) {
            Some(tool) => tool
                .execute(&step.tool_input)
                .await
                .map_err(|err| err.to_string()),
            None if name == MOCK_TOOL_NAME => {
                Ok(format!("Step '{}' executed successfully (mock result)", step.title))
            }
            None => Err(format!("unknown tool: {name}")),
        }
    }
}

#[async_trait]
impl Executor for NaiveExecutor {
    async fn execute_step(
        &self,
        ctx: &RequestContext,
        task: &Task,
        step: &Step,
    ) -> Result<StepResult, CoreError> {
        debug!(
            "executing step (task_id={}, step_id={}, type={})",
            task.id,
            step.id,
            step.step_type.as_str()
        );
        let started = Instant::now();
        if !self.delay.is_zero() {
            let delay = self.delay;
            ctx.run(async move {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }

        let outcome = match step.step_type {
            StepType::ToolCall => ctx.run(async { Ok(self.run_tool(step).await) }).await?,
            _ => Ok(format!(
                "Step '{}' executed successfully ({})",
                step.title,
                step.step_type.as_str()
            )),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(match outcome {
            Ok(output) => StepResult::success(&step.id, output, duration_ms),
            Err(message) => StepResult::failure(&step.id, message, duration_ms),
        })
    }
}
