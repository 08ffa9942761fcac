use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A piece of an in-flight completion.
///
/// Text deltas arrive as the backend produces them; the final assembled
/// message (including any tool requests, whose arguments are only valid
/// once fully buffered) is emitted exactly once at the end of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    Text(String),
    Message(Message),
}

pub type CompletionStream = BoxStream<'static, Result<CompletionChunk>>;

/// Base trait for AI providers (OpenAI, watsonx, vLLM)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given conversation and tool set.
    /// One call is one round trip: no retries, no caching, no pooling.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)>;

    /// Generate the next message as a stream of chunks. Granularity is
    /// whatever the backend emits.
    async fn complete_stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<CompletionStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_serialization() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage).unwrap();
        let deserialized: Usage = serde_json::from_str(&serialized).unwrap();

        assert_eq!(usage.input_tokens, deserialized.input_tokens);
        assert_eq!(usage.output_tokens, deserialized.output_tokens);
        assert_eq!(usage.total_tokens, deserialized.total_tokens);
    }

    #[test]
    fn test_provider_is_object_safe() {
        fn _assert_object_safe(_: &dyn Provider) {}
    }
}
