use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "At least one message is required"))]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub tokens_used: i64,
    pub calls_used: i32,
    pub calls_limit: i32,
}
