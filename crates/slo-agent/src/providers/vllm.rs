use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{CompletionStream, Provider, Usage};
use super::configs::VllmProviderConfig;
use super::streaming::sse_response_to_stream;
use super::utils::{chat_payload, get_openai_usage, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Self-hosted vLLM backend behind its OpenAI-compatible serving endpoint.
/// Unauthenticated deployments accept any bearer token, so the key defaults
/// to "EMPTY" upstream.
pub struct VllmProvider {
    client: Client,
    config: VllmProviderConfig,
}

impl VllmProvider {
    pub fn new(config: VllmProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.api_base.trim_end_matches('/')
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
impl Provider for VllmProvider {
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
            return Err(anyhow!("vLLM API error: {}", error));
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
