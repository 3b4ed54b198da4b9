//! VK channel: replies through the `messages.send` API method.

use crate::channels::outbound::{ReplyPayload, ReplySender};
use async_trait::async_trait;
use serde::Deserialize;

/// VK API version used for both the Callback API and outgoing calls.
pub const VK_API_VERSION: &str = "5.131";

#[derive(Debug, thiserror::Error)]
pub enum VkError {
    #[error("vk request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("vk response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("vk api error: {details}")]
    Remote { details: String },
}

/// `messages.send` answers 200 even on failure; failures carry an `error` object.
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// VK API client for a community access token.
#[derive(Clone)]
pub struct VkClient {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl VkClient {
    /// `api_base` is the method root, normally `https://api.vk.com/method`.
    pub fn new(token: impl Into<String>, api_base: &str) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Send `message` to `peer_id` as a reply to `reply_to`. A fresh `random_id` is generated per
    /// call; there is no retry.
    pub async fn send_message(
        &self,
        peer_id: i64,
        reply_to: i64,
        message: &str,
        keyboard: Option<&serde_json::Value>,
    ) -> Result<(), VkError> {
        let keyboard = encode_keyboard(keyboard);
        let url = format!("{}/messages.send", self.api_base);
        let peer_id = peer_id.to_string();
        let reply_to = reply_to.to_string();
        let nonce = random_id().to_string();
        let res = self
            .client
            .get(&url)
            .query(&[
                ("access_token", self.token.as_str()),
                ("message", message),
                ("peer_id", peer_id.as_str()),
                ("reply_to", reply_to.as_str()),
                ("keyboard", keyboard.as_str()),
                ("random_id", nonce.as_str()),
                ("v", VK_API_VERSION),
            ])
            .send()
            .await?;
        let body = res.bytes().await?;
        check_send_response(&body)
    }
}

/// Keyboard JSON, or an empty string when no keyboard is configured.
fn encode_keyboard(keyboard: Option<&serde_json::Value>) -> String {
    keyboard.map(|k| k.to_string()).unwrap_or_default()
}

/// Unix time in nanoseconds; VK drops sends that reuse a `random_id`.
fn random_id() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn check_send_response(body: &[u8]) -> Result<(), VkError> {
    let data: SendResponse = serde_json::from_slice(body)?;
    match data.error {
        None | Some(serde_json::Value::Null) => Ok(()),
        Some(serde_json::Value::Object(ref m)) if m.is_empty() => Ok(()),
        Some(err) => {
            let details = match (err.get("error_code"), err.get("error_msg").and_then(|v| v.as_str())) {
                (Some(code), Some(msg)) => format!("{} ({})", msg, code),
                _ => err.to_string(),
            };
            Err(VkError::Remote { details })
        }
    }
}

#[async_trait]
impl ReplySender for VkClient {
    async fn send(&self, reply: &ReplyPayload) -> Result<(), VkError> {
        self.send_message(
            reply.conversation_id,
            reply.correlation_id,
            &reply.body,
            reply.keyboard.as_ref(),
        )
        .await
    }
}
