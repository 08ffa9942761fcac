use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

use super::protocol::{
    initialize_params, methods, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

#[derive(Error, Debug)]
pub enum McpError {
    #[error("MCP server unavailable: {0}")]
    Unavailable(String),

    #[error("MCP server did not respond within {0:?}")]
    Timeout(Duration),

    #[error("MCP protocol error: {0}")]
    Protocol(String),
}

/// Client for one MCP server session over stdio.
///
/// The capability handshake (`initialize` then the `initialized`
/// notification) runs exactly once, in `connect`. Requests carry
/// monotonically increasing numeric ids and responses are matched by id;
/// every read is bounded by the configured timeout so a slow or absent
/// server surfaces as `McpError::Timeout` rather than a hang.
#[derive(Debug)]
pub struct McpClient {
    // Held so the child is killed when the client is dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: i64,
    timeout: Duration,
}

impl McpClient {
    /// Spawn the server process and perform the capability handshake.
    pub async fn connect(
        command: &str,
        args: &[String],
        envs: &HashMap<String, String>,
        wait: Duration,
    ) -> Result<Self, McpError> {
        debug!(command, ?args, "starting MCP server");
        let mut child = Command::new(command)
            .args(args)
            .envs(envs)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Unavailable(format!("failed to start {}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Unavailable("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Unavailable("child stdout not captured".to_string()))?;

        let mut client = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            timeout: wait,
        };

        client
            .request(methods::INITIALIZE, Some(initialize_params()))
            .await?;
        client.notify(methods::INITIALIZED, None).await?;
        debug!("MCP session initialized");

        Ok(client)
    }

    /// Invoke a tool on the server and return the raw `result` value.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.request(
            methods::TOOLS_CALL,
            Some(json!({
                "name": name,
                "arguments": arguments,
            })),
        )
        .await
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        let encoded = serde_json::to_string(&request)
            .map_err(|e| McpError::Protocol(format!("could not encode request: {}", e)))?;
        self.send_line(&encoded).await?;
        self.read_response(id).await
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        let encoded = serde_json::to_string(&notification)
            .map_err(|e| McpError::Protocol(format!("could not encode notification: {}", e)))?;
        self.send_line(&encoded).await
    }

    async fn send_line(&mut self, line: &str) -> Result<(), McpError> {
        let write = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        };
        write
            .await
            .map_err(|e| McpError::Unavailable(format!("could not write to server: {}", e)))
    }

    async fn read_response(&mut self, id: i64) -> Result<Value, McpError> {
        loop {
            let line = timeout(self.timeout, self.stdout.next_line())
                .await
                .map_err(|_| McpError::Timeout(self.timeout))?
                .map_err(|e| McpError::Unavailable(format!("could not read from server: {}", e)))?
                .ok_or_else(|| McpError::Unavailable("server closed its output".to_string()))?;

            if line.trim().is_empty() {
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_str(&line)
                .map_err(|e| McpError::Protocol(format!("undecodable frame: {}", e)))?;

            match response.id {
                // Server-initiated notifications and stale replies are skipped.
                Some(response_id) if response_id == id => {
                    if let Some(error) = response.error {
                        return Err(McpError::Protocol(format!(
                            "{} (code {})",
                            error.message, error.code
                        )));
                    }
                    return response.result.ok_or_else(|| {
                        McpError::Protocol(
                            "response carried neither result nor error".to_string(),
                        )
                    });
                }
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_server(script: &str) -> (String, Vec<String>) {
        ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
    }

    async fn connect(script: &str, wait_ms: u64) -> Result<McpClient, McpError> {
        let (command, args) = sh_server(script);
        McpClient::connect(
            &command,
            &args,
            &HashMap::new(),
            Duration::from_millis(wait_ms),
        )
        .await
    }

    #[tokio::test]
    async fn test_connect_unavailable_binary() {
        let result = McpClient::connect(
            "definitely-not-an-mcp-server",
            &[],
            &HashMap::new(),
            Duration::from_millis(500),
        )
        .await;

        assert!(matches!(result, Err(McpError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_connect_timeout_on_silent_server() {
        // A server that never answers the initialize request.
        let result = connect("sleep 5", 200).await;
        assert!(matches!(result, Err(McpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_handshake_and_tool_call() {
        let script = r#"
read init
printf '%s\n' '{"jsonrpc":"2.0","id":0,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read notif
read call
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"{\"label\":\"checkout\"}"}]}}'
"#;

        let mut client = connect(script, 2000).await.unwrap();
        let result = client
            .call_tool("get_application_config", json!({"id": "app-1"}))
            .await
            .unwrap();

        assert_eq!(
            result["content"][0]["text"].as_str().unwrap(),
            "{\"label\":\"checkout\"}"
        );
    }

    #[tokio::test]
    async fn test_tool_call_error_response() {
        let script = r#"
read init
printf '%s\n' '{"jsonrpc":"2.0","id":0,"result":{}}'
read notif
read call
printf '%s\n' '{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}'
"#;

        let mut client = connect(script, 2000).await.unwrap();
        let err = client.call_tool("missing_tool", json!({})).await.unwrap_err();

        match err {
            McpError::Protocol(message) => {
                assert!(message.contains("Method not found"));
                assert!(message.contains("-32601"));
            }
            other => panic!("Expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrelated_frames_are_skipped() {
        // A progress notification and a stale reply arrive before the real
        // response; both must be skipped by id correlation.
        let script = r#"
read init
printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/progress","params":{}}'
printf '%s\n' '{"jsonrpc":"2.0","id":99,"result":{}}'
printf '%s\n' '{"jsonrpc":"2.0","id":0,"result":{"protocolVersion":"2024-11-05"}}'
read notif
read call
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"content":[]}}'
"#;

        let mut client = connect(script, 2000).await.unwrap();
        let result = client.call_tool("anything", json!({})).await.unwrap();
        assert!(result["content"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_protocol_error() {
        let script = r#"
read init
printf '%s\n' 'this is not json'
"#;

        let err = connect(script, 2000).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }
}
