use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;
use crate::providers::base::{CompletionChunk, CompletionStream, Provider, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    /// Number of scripted responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// Shared handle onto the response script, for asserting consumption
    /// after the provider has been boxed away
    pub fn responses(&self) -> Arc<Mutex<Vec<Message>>> {
        Arc::clone(&self.responses)
    }

    fn next_response(&self) -> Message {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Message::assistant().with_text("")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        Ok((self.next_response(), Usage::default()))
    }

    async fn complete_stream(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<CompletionStream> {
        let response = self.next_response();
        Ok(Box::pin(try_stream! {
            // One chunk per text content item, then the assembled message,
            // mirroring how the SSE path buffers tool calls to the end.
            for content in &response.content {
                if let MessageContent::Text(text) = content {
                    yield CompletionChunk::Text(text.clone());
                }
            }
            yield CompletionChunk::Message(response);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_stream_yields_text_then_message() {
        let provider = MockProvider::new(vec![Message::assistant()
            .with_text("Hel")
            .with_text("lo")
            .with_tool_request("1", Ok(ToolCall::new("search", json!({"query": "x"}))))]);

        let mut stream = provider.complete_stream("", &[], &[]).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(chunks[0], CompletionChunk::Text("Hel".to_string()));
        assert_eq!(chunks[1], CompletionChunk::Text("lo".to_string()));
        assert!(matches!(chunks[2], CompletionChunk::Message(_)));
    }
}
