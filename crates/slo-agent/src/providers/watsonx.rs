use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{CompletionStream, Provider, Usage};
use super::configs::WatsonxProviderConfig;
use super::streaming::sse_response_to_stream;
use super::utils::{chat_payload, get_openai_usage, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Proxy-routed watsonx backend. The proxy speaks the OpenAI-compatible
/// chat wire; routing is selected by the `watsonx/` model prefix and the
/// project id carried in the payload.
pub struct WatsonxProvider {
    client: Client,
    config: WatsonxProviderConfig,
}

impl WatsonxProvider {
    pub fn new(config: WatsonxProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.url.trim_end_matches('/')
        )
    }

    fn payload(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        stream: bool,
    ) -> Result<Value> {
        let model = format!("watsonx/{}", self.config.model);
        let mut payload = chat_payload(
            &model,
            system,
            messages,
            tools,
            self.config.temperature,
            stream,
        )?;
        payload
            .as_object_mut()
            .unwrap()
            .insert("project_id".to_string(), json!(self.config.project_id));
        Ok(payload)
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response> {
        debug!(model = %self.config.model, project_id = %self.config.project_id, "requesting chat completion");
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
impl Provider for WatsonxProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = self.payload(system, messages, tools, false)?;
        let response: Value = self.post(payload).await?.json().await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("watsonx API error: {}", error));
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
        let payload = self.payload(system, messages, tools, true)?;
        let response = self.post(payload).await?;
        Ok(sse_response_to_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_routes_through_proxy() {
        let response_body = json!({
            "id": "chatcmpl-wx",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Granite says hello."
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 9,
                "completion_tokens": 4,
                "total_tokens": 13
            }
        });

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            // Routing convention: prefixed model name plus project id.
            .and(body_partial_json(json!({
                "model": "watsonx/ibm/granite-13b-chat-v2",
                "project_id": "proj-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = WatsonxProviderConfig {
            url: mock_server.uri(),
            api_key: "wx-key".to_string(),
            project_id: "proj-42".to_string(),
            model: "ibm/granite-13b-chat-v2".to_string(),
            temperature: Some(0.7),
        };

        let provider = WatsonxProvider::new(config).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await
            .unwrap();

        assert_eq!(message.text(), "Granite says hello.");
        assert_eq!(usage.total_tokens, Some(13));
    }
}
