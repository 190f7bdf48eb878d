//! Tools agents may call during a task

mod website_search;

pub use website_search::WebsiteSearchTool;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use grocer_error::Result;
use grocer_llm::{ToolCall, ToolDefinition};

/// A capability exposed to the model through function calling.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON parameter schema shown to the model
    fn definition(&self) -> ToolDefinition;

    /// Run with the raw JSON arguments the model produced
    async fn call(&self, arguments: &str) -> Result<String>;
}

/// The tools one agent carries.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    /// Run a tool call and produce the text fed back to the model.
    ///
    /// Failures become the result text so the model can adjust its call.
    pub async fn invoke(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.definition().name == call.name) else {
            warn!(tool = %call.name, "model called an unknown tool");
            return format!(
                "Error: no tool named '{}'. Available tools: {}",
                call.name,
                self.names().join(", ")
            );
        };

        match tool.call(&call.arguments).await {
            Ok(output) => {
                debug!(tool = %call.name, chars = output.len(), "tool finished");
                output
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                format!("Error: {}", e.message())
            }
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grocer_error::Error;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Echo the arguments back")
        }

        async fn call(&self, arguments: &str) -> Result<String> {
            if arguments.contains("boom") {
                return Err(Error::tool_failed("echo", "exploded"));
            }
            Ok(arguments.to_string())
        }
    }

    fn toolset() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.push(Arc::new(Echo));
        tools
    }

    #[tokio::test]
    async fn invoke_known_tool() {
        let out = toolset().invoke(&ToolCall::new("1", "echo", "{\"q\":1}")).await;
        assert_eq!(out, "{\"q\":1}");
    }

    #[tokio::test]
    async fn tool_error_is_fed_back() {
        let out = toolset().invoke(&ToolCall::new("1", "echo", "boom")).await;
        assert_eq!(out, "Error: exploded");
    }

    #[tokio::test]
    async fn unknown_tool_lists_available() {
        let out = toolset().invoke(&ToolCall::new("1", "grep", "{}")).await;
        assert!(out.contains("no tool named 'grep'"));
        assert!(out.contains("echo"));
    }

    #[test]
    fn definitions_follow_tools() {
        let tools = toolset();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools.definitions()[0].name, "echo");
    }
}
