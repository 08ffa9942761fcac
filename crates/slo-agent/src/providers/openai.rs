use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{CompletionStream, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::streaming::sse_response_to_stream;
use super::utils::{chat_payload, get_openai_usage, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        )
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response> {
        debug!(model = %self.config.model, "requesting chat completion");
        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}\nPayload: {}", status, payload)),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = chat_payload(
            &self.config.model,
            system,
            messages,
            tools,
            self.config.temperature,
            false,
        )?;

        let response: Value = self.post(payload).await?.json().await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = get_openai_usage(&response)?;

        Ok((message, usage))
    }

    async fn complete_stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<CompletionStream> {
        let payload = chat_payload(
            &self.config.model,
            system,
            messages,
            tools,
            self.config.temperature,
            true,
        )?;

        let response = self.post(payload).await?;
        Ok(sse_response_to_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::CompletionChunk;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn _setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) = _setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("Hello?")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await
            .unwrap();

        assert_eq!(message.text(), "Hello! How can I assist you today?");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
    }

    #[tokio::test]
    async fn test_complete_tool_request() {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"location\":\"San Francisco, CA\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_, provider) = _setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("What's the weather in San Francisco?")];
        let tool = Tool::new(
            "get_weather",
            "Gets the current weather for a location",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state, e.g. New York, NY"
                    }
                },
                "required": ["location"]
            }),
        );

        let (message, _usage) = provider
            .complete("You are a helpful assistant.", &messages, &[tool])
            .await
            .unwrap();

        let requests = message.tool_requests();
        let tool_call = requests[0].tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "get_weather");
        assert_eq!(tool_call.arguments, json!({"location": "San Francisco, CA"}));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];
        let result = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await;

        assert!(result.unwrap_err().to_string().contains("Server error: 500"));
    }

    #[tokio::test]
    async fn test_complete_stream_chunks() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        let messages = vec![Message::user().with_text("Hi")];
        let mut stream = provider
            .complete_stream("You are a helpful assistant.", &messages, &[])
            .await
            .unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(
            chunks[0],
            CompletionChunk::Text("Hel".to_string())
        );
        assert_eq!(chunks[1], CompletionChunk::Text("lo".to_string()));
        match &chunks[2] {
            CompletionChunk::Message(message) => assert_eq!(message.text(), "Hello"),
            other => panic!("Expected final message, got {:?}", other),
        }
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_complete_stream_tool_call_buffered() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"calculator\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"expression\\\": \\\"25 * 47\\\"}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        let messages = vec![Message::user().with_text("25 * 47?")];
        let mut stream = provider
            .complete_stream("You are a helpful assistant.", &messages, &[])
            .await
            .unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }

        // No text deltas, just the assembled tool request at the end.
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            CompletionChunk::Message(message) => {
                let requests = message.tool_requests();
                let tool_call = requests[0].tool_call.as_ref().unwrap();
                assert_eq!(tool_call.name, "calculator");
                assert_eq!(tool_call.arguments, json!({"expression": "25 * 47"}));
            }
            other => panic!("Expected final message, got {:?}", other),
        }
    }
}
