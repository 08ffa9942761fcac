use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that ride inside the conversation instead of aborting it.
///
/// Tool-level errors are embedded in messages and rendered as error text on
/// the provider wire, so the model can read them and react; only provider
/// transport failures escape the loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    /// The model asked for a name that is not in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The emitted function name is not a legal tool identifier.
    #[error("Invalid tool name: {0}")]
    InvalidToolName(String),

    /// The arguments did not match the tool's declared schema.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The tool ran and failed; converted to error text at the registry
    /// boundary.
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
