use anyhow::{anyhow, Result};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::models::message::{Message, ToolRequest};
use crate::models::tool::ToolCall;
use crate::providers::base::{CompletionChunk, Provider};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant for site reliability work. You can calculate, \
search, look up weather, and fetch or summarize Instana application \
configurations using the available tools. Use a tool whenever it would give \
a more reliable answer than guessing, and keep your final answers concise.";

/// The outcome of one completed turn.
#[derive(Debug, Clone)]
pub struct AgentRunResult {
    /// Final response text from the model
    pub response: String,
    /// The caller's history extended with everything this turn appended
    pub conversation_history: Vec<Message>,
    /// Tool calls actually executed, in execution order
    pub tool_calls: Vec<ToolCall>,
    /// Set when the turn ended on the round-trip budget rather than a
    /// tool-free response
    pub budget_exhausted: bool,
}

/// One increment of a streaming turn.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A piece of assistant text, in whatever granularity the provider emits
    Chunk(String),
    /// A message appended to the conversation (the assembled assistant
    /// response, or a tool result)
    Message(Message),
}

/// Agent wires a model provider to a tool registry and runs the
/// conversation loop: ask the model, execute whatever tools it requested,
/// feed the results back, and stop once it answers without tool calls or
/// the round-trip budget runs out.
pub struct Agent {
    provider: Box<dyn Provider + Send + Sync>,
    registry: ToolRegistry,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider + Send + Sync>, registry: ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Cap on Reasoning/Acting round trips per turn. Once spent, the next
    /// model response is returned as-is even if it still requests tools.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Run one turn to completion and return the extended history.
    ///
    /// The caller owns the history across turns; this method never retains
    /// it. Provider transport failures propagate; tool failures do not.
    pub async fn run(
        &self,
        user_input: &str,
        conversation_history: Option<Vec<Message>>,
    ) -> Result<AgentRunResult> {
        let mut messages = conversation_history.unwrap_or_default();
        messages.push(Message::user().with_text(user_input));

        let tools = self.registry.tools();
        let mut executed: Vec<ToolCall> = Vec::new();
        let mut rounds = 0;

        loop {
            let (response, _usage) = self
                .provider
                .complete(&self.system_prompt, &messages, &tools)
                .await?;
            messages.push(response.clone());

            let requests = response.tool_requests();
            if requests.is_empty() {
                return Ok(AgentRunResult {
                    response: response.text(),
                    conversation_history: messages,
                    tool_calls: executed,
                    budget_exhausted: false,
                });
            }
            if rounds >= self.max_tool_rounds {
                warn!(rounds, "tool round budget exhausted, returning last response");
                return Ok(AgentRunResult {
                    response: response.text(),
                    conversation_history: messages,
                    tool_calls: executed,
                    budget_exhausted: true,
                });
            }
            rounds += 1;

            let (tool_messages, calls) = self.run_tool_round(&requests).await;
            executed.extend(calls);
            messages.extend(tool_messages);
        }
    }

    /// Run one turn as a stream of events: text chunks as the provider
    /// produces them, then each message appended to the conversation. The
    /// stream is finite and not restartable; dropping it between yields
    /// abandons the turn with no cleanup needed.
    pub fn stream(
        &self,
        user_input: &str,
        conversation_history: Option<Vec<Message>>,
    ) -> BoxStream<'_, Result<AgentEvent>> {
        let mut messages = conversation_history.unwrap_or_default();
        messages.push(Message::user().with_text(user_input));

        Box::pin(try_stream! {
            let tools = self.registry.tools();
            let mut rounds = 0;

            loop {
                let mut completion = self
                    .provider
                    .complete_stream(&self.system_prompt, &messages, &tools)
                    .await?;

                let mut response: Option<Message> = None;
                while let Some(chunk) = completion.next().await {
                    match chunk? {
                        CompletionChunk::Text(piece) => yield AgentEvent::Chunk(piece),
                        CompletionChunk::Message(message) => response = Some(message),
                    }
                }
                let response = response
                    .ok_or_else(|| anyhow!("provider stream ended without a final message"))?;

                messages.push(response.clone());
                yield AgentEvent::Message(response.clone());

                let requests = response.tool_requests();
                if requests.is_empty() {
                    break;
                }
                if rounds >= self.max_tool_rounds {
                    warn!(rounds, "tool round budget exhausted, ending stream");
                    break;
                }
                rounds += 1;

                let (tool_messages, _calls) = self.run_tool_round(&requests).await;
                for message in tool_messages {
                    messages.push(message.clone());
                    yield AgentEvent::Message(message);
                }
            }
        })
    }

    /// Execute one Acting phase. Dispatch runs concurrently, but results
    /// are appended in the order the model requested them, not completion
    /// order.
    async fn run_tool_round(&self, requests: &[&ToolRequest]) -> (Vec<Message>, Vec<ToolCall>) {
        let futures: Vec<_> = requests
            .iter()
            .map(|request| self.dispatch_tool_call(request.tool_call.clone()))
            .collect();
        let outputs = futures::future::join_all(futures).await;

        let mut tool_messages = Vec::new();
        let mut executed = Vec::new();
        for (request, output) in requests.iter().zip(outputs.into_iter()) {
            debug!(id = %request.id, ok = output.is_ok(), "tool call finished");
            if let Ok(call) = &request.tool_call {
                executed.push(call.clone());
            }
            tool_messages.push(Message::tool().with_tool_response(request.id.clone(), output));
        }
        (tool_messages, executed)
    }

    async fn dispatch_tool_call(
        &self,
        tool_call: crate::errors::AgentResult<ToolCall>,
    ) -> crate::errors::AgentResult<String> {
        let call = tool_call?;
        self.registry.invoke(&call.name, call.arguments).await
    }
}
