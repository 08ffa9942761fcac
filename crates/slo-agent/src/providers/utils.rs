use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::Usage;

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::Tool => {
                // One wire entry per tool result, tied back to its call id.
                for content in &message.content {
                    if let MessageContent::ToolResponse(response) = content {
                        let text = match &response.tool_result {
                            Ok(text) => text.clone(),
                            Err(e) => {
                                format!("The tool call returned the following error:\n{}", e)
                            }
                        };
                        messages_spec.push(json!({
                            "role": "tool",
                            "content": text,
                            "tool_call_id": response.id
                        }));
                    }
                }
            }
            _ => {
                let mut converted = json!({
                    "role": message.role
                });
                let mut output = Vec::new();

                let text = message.text();
                if !text.is_empty() {
                    converted["content"] = json!(text);
                }

                for content in &message.content {
                    if let MessageContent::ToolRequest(request) = content {
                        match &request.tool_call {
                            Ok(tool_call) => {
                                let sanitized_name = sanitize_function_name(&tool_call.name);
                                let tool_calls = converted
                                    .as_object_mut()
                                    .unwrap()
                                    .entry("tool_calls")
                                    .or_insert(json!([]));

                                tool_calls.as_array_mut().unwrap().push(json!({
                                    "id": request.id,
                                    "type": "function",
                                    "function": {
                                        "name": sanitized_name,
                                        "arguments": tool_call.arguments.to_string(),
                                    }
                                }));
                            }
                            Err(e) => {
                                output.push(json!({
                                    "role": "tool",
                                    "content": format!("Error: {}", e),
                                    "tool_call_id": request.id
                                }));
                            }
                        }
                    }
                }

                if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
                    output.insert(0, converted);
                }
                messages_spec.extend(output);
            }
        }
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response["choices"][0]["message"].clone();
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            message = message.with_content(assemble_tool_request(id, function_name, arguments));
        }
    }

    Ok(message)
}

/// Build a tool request from raw wire fields, carrying malformed emissions
/// in-band as errors.
pub fn assemble_tool_request(id: String, name: String, arguments: String) -> MessageContent {
    if !is_valid_function_name(&name) {
        let error = AgentError::InvalidToolName(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            name
        ));
        return MessageContent::tool_request(id, Err(error));
    }

    let raw = if arguments.is_empty() {
        "{}".to_string()
    } else {
        arguments
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(params) => MessageContent::tool_request(id, Ok(ToolCall::new(name, params))),
        Err(e) => {
            let error = AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ));
            MessageContent::tool_request(id, Err(error))
        }
    }
}

/// Extract token accounting from an OpenAI-compatible response body.
pub fn get_openai_usage(data: &Value) -> Result<Usage> {
    let usage = data
        .get("usage")
        .ok_or_else(|| anyhow!("No usage data in response"))?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Ok(Usage::new(input_tokens, output_tokens, total_tokens))
}

/// Build the chat-completions payload shared by every backend.
pub fn chat_payload(
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
    temperature: Option<f32>,
    stream: bool,
) -> Result<Value> {
    let system_message = json!({
        "role": "system",
        "content": system
    });

    let messages_spec = messages_to_openai_spec(messages);
    let tools_spec = tools_to_openai_spec(tools)?;

    let mut messages_array = vec![system_message];
    messages_array.extend(messages_spec);

    let mut payload = json!({
        "model": model,
        "messages": messages_array
    });

    let payload_map = payload.as_object_mut().unwrap();
    if !tools_spec.is_empty() {
        payload_map.insert("tools".to_string(), json!(tools_spec));
    }
    if let Some(temp) = temperature {
        payload_map.insert("temperature".to_string(), json!(temp));
    }
    if stream {
        payload_map.insert("stream".to_string(), json!(true));
    }

    Ok(payload)
}

fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "input_tokens": 10,
            "output_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[test]
    fn test_messages_to_openai_spec() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_messages_to_openai_spec_complex() {
        let messages = vec![
            Message::assistant().with_text("Hello!"),
            Message::user().with_text("How are you?"),
            Message::assistant().with_tool_request(
                "tool1",
                Ok(ToolCall::new("example", json!({"param1": "value1"}))),
            ),
            Message::tool().with_tool_response("tool1", Ok("Result".to_string())),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[0]["role"], "assistant");
        assert_eq!(spec[0]["content"], "Hello!");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[1]["content"], "How are you?");
        assert_eq!(spec[2]["role"], "assistant");
        assert!(spec[2]["tool_calls"].is_array());
        assert_eq!(spec[3]["role"], "tool");
        assert_eq!(spec[3]["content"], "Result");
        assert_eq!(spec[3]["tool_call_id"], spec[2]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_messages_to_openai_spec_error_result() {
        let messages = vec![Message::tool().with_tool_response(
            "call_7",
            Err(crate::errors::AgentError::ExecutionError(
                "division by zero".to_string(),
            )),
        )];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "tool");
        assert!(spec[0]["content"]
            .as_str()
            .unwrap()
            .contains("division by zero"));
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Test parameter"
                    }
                },
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool]).unwrap();

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let schema = json!({"type": "object", "properties": {}});
        let tool1 = Tool::new("test_tool", "Test tool", schema.clone());
        let tool2 = Tool::new("test_tool", "Test tool", schema);

        let result = tools_to_openai_spec(&[tool1, tool2]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_openai_response_to_message_text() {
        let response = json!({
            "choices": [{
                "role": "assistant",
                "message": {
                    "content": "Hello from the assistant!"
                }
            }],
            "usage": {
                "input_tokens": 10,
                "output_tokens": 25,
                "total_tokens": 35
            }
        });

        let message = openai_response_to_message(response).unwrap();
        assert_eq!(message.text(), "Hello from the assistant!");
        assert_eq!(message.role, crate::models::role::Role::Assistant);
    }

    #[test]
    fn test_openai_response_to_message_valid_toolrequest() {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        let message = openai_response_to_message(response).unwrap();

        assert_eq!(message.content.len(), 1);
        let requests = message.tool_requests();
        let tool_call = requests[0].tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "example_fn");
        assert_eq!(tool_call.arguments, json!({"param": "value"}));
    }

    #[test]
    fn test_openai_response_to_message_invalid_func_name() {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] =
            json!("invalid fn");

        let message = openai_response_to_message(response).unwrap();

        match &message.tool_requests()[0].tool_call {
            Err(AgentError::InvalidToolName(msg)) => {
                assert!(msg.starts_with("The provided function name"));
            }
            other => panic!("Expected InvalidToolName error, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_response_to_message_json_decode_error() {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(response).unwrap();

        match &message.tool_requests()[0].tool_call {
            Err(AgentError::InvalidParameters(msg)) => {
                assert!(msg.starts_with("Could not interpret tool use parameters"));
            }
            other => panic!("Expected InvalidParameters error, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_payload() {
        let messages = vec![Message::user().with_text("Hi")];
        let payload = chat_payload("gpt-4o-mini", "Be helpful.", &messages, &[], Some(0.7), false)
            .unwrap();

        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["temperature"], 0.7);
        assert!(payload.get("tools").is_none());
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello-world"));
        assert!(is_valid_function_name("hello_world"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
    }
}
