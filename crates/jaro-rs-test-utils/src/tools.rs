use async_trait::async_trait;
use jaro_rs_protocol::{RiskLevel, Tool, ToolFailure, ToolMetadata};

/// Tool with fixed metadata that echoes its input behind a prefix, or
/// always fails.
#[derive(Debug, Clone)]
pub struct StubTool {
    metadata: ToolMetadata,
    failure: Option<String>,
}

impl StubTool {
    pub fn new(name: impl Into<String>, risk_level: RiskLevel) -> Self {
        let name = name.into();
        Self {
            metadata: ToolMetadata {
                description: format!("stub {name}"),
                name,
                category: "test".to_string(),
                risk_level,
            },
            failure: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = category.into();
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl Tool for StubTool {
    fn metadata(&self) -> ToolMetadata {
        self.metadata.clone()
    }

    async fn execute(&self, input: &str) -> Result<String, ToolFailure> {
        match &self.failure {
            Some(message) => Err(ToolFailure(message.clone())),
            None => Ok(format!("{}: {input}", self.metadata.name)),
        }
    }
}
