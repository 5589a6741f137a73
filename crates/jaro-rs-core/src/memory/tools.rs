//! Tool registry and built-in tools.

use crate::ports::ToolRegistry;
use async_trait::async_trait;
use jaro_rs_protocol::{RiskLevel, Tool, ToolFailure, ToolMetadata};
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory registry of tool implementations, listed in name order.
#[derive(Default, Clone)]
pub struct InMemoryToolRegistry {
    tools: Arc<RwLock<BTreeMap<String, Arc<dyn Tool>>>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`EchoTool`].
    pub fn with_builtin_tools() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        debug!("registering tool (name={name})");
        self.tools.write().insert(name, tool);
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn list_tools(&self) -> Vec<ToolMetadata> {
        self.tools.read().values().map(|tool| tool.metadata()).collect()
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }
}

/// Returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTool;

impl EchoTool {
    pub const NAME: &'static str = "echo";
}

#[async_trait]
impl Tool for EchoTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: Self::NAME.to_string(),
            description: "Echo the input back as output".to_string(),
            category: "utility".to_string(),
            risk_level: RiskLevel::Low,
        }
    }

    async fn execute(&self, input: &str) -> Result<String, ToolFailure> {
        Ok(input.to_string())
    }
}
