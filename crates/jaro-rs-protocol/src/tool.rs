use crate::plan::RiskLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Description of a tool offered to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

/// Error returned by a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tool failed: {0}")]
pub struct ToolFailure(pub String);

/// Executable tool resolved by the executor.
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;

    /// Run the tool with its raw input and return its output.
    async fn execute(&self, input: &str) -> Result<String, ToolFailure>;

    fn name(&self) -> String {
        self.metadata().name
    }
}

/// Output of one executor invocation. Folded into task and step state by
/// the engine; never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub usage_tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            output: output.into(),
            error_message: None,
            duration_ms,
            usage_tokens: 0,
            cost: 0.0,
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            output: String::new(),
            error_message: Some(error.into()),
            duration_ms,
            usage_tokens: 0,
            cost: 0.0,
        }
    }

    pub fn with_usage(mut self, tokens: u64, cost: f64) -> Self {
        self.usage_tokens = tokens;
        self.cost = cost;
        self
    }
}
