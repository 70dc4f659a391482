use serde::{Deserialize, Serialize};

// Single chat message, role is forwarded as-is
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

// OpenAI-style chat completion request.
// Unknown fields in the inbound body are dropped, only model + messages go downstream.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}
