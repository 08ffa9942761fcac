use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::tools::ToolHandler;

/// Mock web search. Results are deterministic text so the agent loop can be
/// exercised without a search backend.
pub struct SearchTool;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "search",
            "Search the web for information about a topic.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let args: SearchArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        Ok(format!(
            "Search results for '{query}':\n\
             1. {query} - overview and documentation\n\
             2. Getting started with {query}\n\
             3. {query} best practices and common pitfalls",
            query = args.query
        ))
    }
}
