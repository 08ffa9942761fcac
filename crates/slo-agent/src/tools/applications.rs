use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Environment;
use crate::errors::{AgentError, AgentResult};
use crate::mcp::McpClient;
use crate::models::tool::Tool;
use crate::tools::ToolHandler;

const DEFAULT_SERVER_PATH: &str = "npx";
const DEFAULT_SERVER_ARGS: &str = "-y @instana/mcp-server-instana";
const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Connection settings for the Instana MCP server. Credentials may be
/// absent; the application tools then answer with a configuration hint
/// instead of attempting a session.
#[derive(Debug, Clone)]
pub struct InstanaSettings {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub server_path: String,
    pub server_args: Vec<String>,
    pub wait: Duration,
}

impl Default for InstanaSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            server_path: DEFAULT_SERVER_PATH.to_string(),
            server_args: DEFAULT_SERVER_ARGS
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            wait: DEFAULT_WAIT,
        }
    }
}

impl InstanaSettings {
    pub fn load(env: &impl Environment) -> Self {
        let defaults = Self::default();
        Self {
            base_url: env.get_var("INSTANA_BASE_URL"),
            api_token: env.get_var("INSTANA_API_TOKEN"),
            server_path: env
                .get_var("INSTANA_MCP_SERVER_PATH")
                .unwrap_or(defaults.server_path),
            server_args: env
                .get_var("INSTANA_MCP_SERVER_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.server_args),
            wait: defaults.wait,
        }
    }

    pub fn from_env() -> Self {
        Self::load(&crate::config::RealEnvironment)
    }
}

/// Fetch an application's configuration through one MCP session: connect,
/// handshake, one `tools/call`, drop. Failures come back as user-facing
/// message strings for the owning tool to embed in its text result.
async fn get_application_config(
    settings: &InstanaSettings,
    application_id: &str,
) -> Result<Value, String> {
    let base_url = settings.base_url.as_deref().ok_or_else(|| {
        "Instana credentials not configured; set INSTANA_BASE_URL and INSTANA_API_TOKEN"
            .to_string()
    })?;
    let api_token = settings.api_token.as_deref().ok_or_else(|| {
        "Instana credentials not configured; set INSTANA_BASE_URL and INSTANA_API_TOKEN"
            .to_string()
    })?;

    let mut envs: HashMap<String, String> = std::env::vars().collect();
    envs.insert("INSTANA_BASE_URL".to_string(), base_url.to_string());
    envs.insert("INSTANA_API_TOKEN".to_string(), api_token.to_string());

    debug!(application_id, "fetching application config over MCP");
    let mut client = McpClient::connect(
        &settings.server_path,
        &settings.server_args,
        &envs,
        settings.wait,
    )
    .await
    .map_err(|e| format!("MCP connection failed: {}", e))?;

    let result = client
        .call_tool("get_application_config", json!({"id": application_id}))
        .await
        .map_err(|e| format!("MCP tool call failed: {}", e))?;

    let text = result["content"][0]["text"]
        .as_str()
        .ok_or_else(|| format!("Could not find application with ID {}", application_id))?;

    // The server returns text; use it as JSON when it parses as such.
    Ok(serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

fn service_names(data: &Value) -> Vec<String> {
    data["services"]
        .as_array()
        .map(|services| {
            services
                .iter()
                .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn tag_list(data: &Value) -> Vec<String> {
    data["tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .map(|t| match t.as_str() {
                    Some(s) => s.to_string(),
                    None => t.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct FetchApplicationTool {
    settings: Arc<InstanaSettings>,
}

impl FetchApplicationTool {
    pub fn new(settings: Arc<InstanaSettings>) -> Self {
        Self { settings }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FetchApplicationArgs {
    application_name: String,
    #[serde(default)]
    application_id: Option<String>,
}

#[async_trait]
impl ToolHandler for FetchApplicationTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "fetch_application",
            "Fetch application details and metadata. If an application id is \
             provided, the configuration is fetched live from Instana.",
            json!({
                "type": "object",
                "properties": {
                    "application_name": {
                        "type": "string",
                        "description": "The name of the application to fetch"
                    },
                    "application_id": {
                        "type": "string",
                        "description": "Optional Instana application ID"
                    }
                },
                "required": ["application_name"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let args: FetchApplicationArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        let Some(application_id) = args.application_id else {
            // Without an id there is nothing to look up remotely.
            return Ok(format!(
                "Application '{}' details: Status=Running, Version=1.0.0, Instances=3",
                args.application_name
            ));
        };

        let data = match get_application_config(&self.settings, &application_id).await {
            Ok(data) => data,
            Err(message) => {
                return Ok(format!(
                    "Error fetching application '{}' from Instana: {}",
                    args.application_name, message
                ))
            }
        };

        let label = data["label"].as_str().unwrap_or(&args.application_name);
        let mut report = format!(
            "Application '{}' (ID: {}) from Instana:\n",
            label, application_id
        );
        report.push_str(&format!(
            "- Boundary Scope: {}\n",
            data["boundaryScope"].as_str().unwrap_or("N/A")
        ));
        if let Some(services) = data["services"].as_array() {
            report.push_str(&format!("- Services: {} configured\n", services.len()));
        }
        let tags = tag_list(&data);
        if !tags.is_empty() {
            report.push_str(&format!("- Tags: {}\n", tags.join(", ")));
        }

        Ok(report)
    }
}

pub struct SummarizeApplicationTool {
    settings: Arc<InstanaSettings>,
}

impl SummarizeApplicationTool {
    pub fn new(settings: Arc<InstanaSettings>) -> Self {
        Self { settings }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SummarizeApplicationArgs {
    application_id: String,
}

#[async_trait]
impl ToolHandler for SummarizeApplicationTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "summarize_application",
            "Fetch and summarize an application configuration from Instana by application ID.",
            json!({
                "type": "object",
                "properties": {
                    "application_id": {
                        "type": "string",
                        "description": "The Instana application ID to summarize"
                    }
                },
                "required": ["application_id"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let args: SummarizeApplicationArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        let data = match get_application_config(&self.settings, &args.application_id).await {
            Ok(data) => data,
            Err(message) => return Ok(format!("Error: {}", message)),
        };

        let mut summary = vec![format!("Application ID: {}", args.application_id)];

        if data.is_object() {
            if let Some(label) = data["label"].as_str() {
                summary.push(format!("Name: {}", label));
            }
            if let Some(scope) = data["boundaryScope"].as_str() {
                summary.push(format!("Boundary Scope: {}", scope));
            }
            if let Some(services) = data["services"].as_array() {
                summary.push(format!("Services: {} configured", services.len()));
                let names = service_names(&data);
                if !names.is_empty() {
                    summary.push(format!("Service Names: {}", names.join(", ")));
                }
            }
            let tags = tag_list(&data);
            if !tags.is_empty() {
                summary.push(format!("Tags: {}", tags.join(", ")));
            }
            for (key, line) in [
                ("createdAt", "Created At"),
                ("updatedAt", "Updated At"),
                ("description", "Description"),
            ] {
                if let Some(value) = data.get(key) {
                    summary.push(format!("{}: {}", line, render_value(value)));
                }
            }
        } else {
            summary.push(format!("Data: {}", render_value(&data)));
        }

        Ok(summary.join("\n"))
    }
}

fn render_value(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
