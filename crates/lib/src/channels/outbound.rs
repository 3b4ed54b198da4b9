//! Outbound reply: one message back to the conversation a command came from.

use crate::channels::vk::VkError;
use async_trait::async_trait;

/// A reply threaded onto the message that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyPayload {
    pub body: String,
    /// VK `peer_id` of the conversation.
    pub conversation_id: i64,
    /// Id of the original message (`reply_to`).
    pub correlation_id: i64,
    /// Keyboard object attached to the reply, if any.
    pub keyboard: Option<serde_json::Value>,
}

/// Sends replies to the chat platform.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, reply: &ReplyPayload) -> Result<(), VkError>;
}
