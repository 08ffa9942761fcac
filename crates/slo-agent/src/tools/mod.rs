pub mod applications;
pub mod calculator;
pub mod search;
pub mod weather;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::tools::applications::InstanaSettings;

/// A named, schema-described callable the model may request.
///
/// Implementations deserialize the argument value into their own typed
/// argument struct, so validation is carried by the type rather than a
/// separate schema interpreter.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The descriptor advertised to the model.
    fn definition(&self) -> Tool;

    /// Execute with the given arguments and return a text result.
    async fn call(&self, arguments: Value) -> AgentResult<String>;
}

/// The fixed set of tools bound to an agent.
///
/// Unknown names and malformed arguments are rejected; failures inside a
/// tool never cross this boundary as errors, they come back as error text
/// the model can read and react to.
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the built-in tool set: calculator, search, weather and
    /// the two Instana application tools.
    pub fn with_builtins(instana: InstanaSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(calculator::CalculatorTool));
        registry.register(Box::new(search::SearchTool));
        registry.register(Box::new(weather::WeatherTool));
        let instana = std::sync::Arc::new(instana);
        registry.register(Box::new(applications::FetchApplicationTool::new(
            instana.clone(),
        )));
        registry.register(Box::new(applications::SummarizeApplicationTool::new(
            instana,
        )));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn ToolHandler>) {
        self.tools.push(tool);
    }

    /// Descriptors of every registered tool, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, arguments: Value) -> AgentResult<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition().name == name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        debug!(tool = name, "invoking tool");
        match tool.call(arguments).await {
            // Execution failures become text so the conversation can continue.
            Err(AgentError::ExecutionError(message)) => Ok(format!("Error: {}", message)),
            other => other,
        }
    }
}
