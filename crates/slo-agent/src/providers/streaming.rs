use std::collections::BTreeMap;

use anyhow::anyhow;
use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::Value;

use crate::models::message::{Message, MessageContent};
use crate::providers::base::{CompletionChunk, CompletionStream};
use crate::providers::utils::assemble_tool_request;

/// A tool call under assembly: the wire delivers the id, name and argument
/// JSON in fragments keyed by index, which only become decodable once the
/// stream ends.
#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn merge(&mut self, fragment: &Value) {
        if let Some(id) = fragment.get("id").and_then(|v| v.as_str()) {
            self.id.push_str(id);
        }
        if let Some(name) = fragment["function"].get("name").and_then(|v| v.as_str()) {
            self.name.push_str(name);
        }
        if let Some(arguments) = fragment["function"]
            .get("arguments")
            .and_then(|v| v.as_str())
        {
            self.arguments.push_str(arguments);
        }
    }

    fn into_request(self) -> MessageContent {
        assemble_tool_request(self.id, self.name, self.arguments)
    }
}

/// Turn an OpenAI-compatible SSE response into a completion stream: text
/// deltas as they arrive, then the assembled message once `[DONE]` is seen.
pub fn sse_response_to_stream(response: reqwest::Response) -> CompletionStream {
    Box::pin(try_stream! {
        let mut events = response.bytes_stream().eventsource();
        let mut text = String::new();
        let mut calls: BTreeMap<u64, PartialToolCall> = BTreeMap::new();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| anyhow!("Stream transport error: {}", e))?;
            if event.data.trim() == "[DONE]" {
                break;
            }

            let value: Value = serde_json::from_str(&event.data)
                .map_err(|e| anyhow!("Undecodable stream event: {}", e))?;
            let delta = &value["choices"][0]["delta"];

            if let Some(piece) = delta.get("content").and_then(|v| v.as_str()) {
                if !piece.is_empty() {
                    text.push_str(piece);
                    yield CompletionChunk::Text(piece.to_string());
                }
            }

            if let Some(fragments) = delta.get("tool_calls").and_then(|v| v.as_array()) {
                for fragment in fragments {
                    let index = fragment.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
                    calls.entry(index).or_default().merge(fragment);
                }
            }
        }

        let mut message = Message::assistant();
        if !text.is_empty() {
            message = message.with_text(text);
        }
        for (_, call) in calls {
            message = message.with_content(call.into_request());
        }
        yield CompletionChunk::Message(message);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_tool_call_assembly() {
        let mut call = PartialToolCall::default();
        call.merge(&json!({
            "index": 0,
            "id": "call_1",
            "function": {"name": "calculator", "arguments": "{\"expr"}
        }));
        call.merge(&json!({
            "index": 0,
            "function": {"arguments": "ession\": \"1 + 1\"}"}
        }));

        let request = call.into_request();
        let request = request.as_tool_request().unwrap();
        let tool_call = request.tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "calculator");
        assert_eq!(tool_call.arguments, json!({"expression": "1 + 1"}));
    }

    #[test]
    fn test_partial_tool_call_bad_arguments() {
        let mut call = PartialToolCall::default();
        call.merge(&json!({
            "index": 0,
            "id": "call_1",
            "function": {"name": "calculator", "arguments": "{broken"}
        }));

        let request = call.into_request();
        let request = request.as_tool_request().unwrap();
        assert!(request.tool_call.is_err());
    }
}
