use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::tools::ToolHandler;

/// Mock weather lookup with canned conditions.
pub struct WeatherTool;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WeatherArgs {
    location: String,
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "get_weather",
            "Get the current weather for a location.",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city to look up, e.g. 'Berlin'"
                    }
                },
                "required": ["location"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let args: WeatherArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        Ok(format!(
            "Weather in {}: 22°C, partly cloudy, wind 8 km/h",
            args.location
        ))
    }
}
