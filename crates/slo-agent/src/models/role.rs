use serde::{Deserialize, Serialize};

/// Who produced a message in the conversation.
///
/// Tool results are their own role: on the OpenAI-compatible wire they are
/// sent as `"role": "tool"` entries tied back to the originating call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}
