//! VK Callback API wire types and the decoded event handed to the dispatcher.

use serde::Deserialize;

/// Callback event type. Only the two the relay acts on are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Confirmation,
    MessageNew,
    #[serde(other)]
    Other,
}

/// Wire body: `{ "type", "v", "secret", "object": { "message": {...} } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    #[serde(rename = "type")]
    pub typ: EventType,
    pub v: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub object: Option<CallbackObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackObject {
    #[serde(default)]
    pub message: Option<CallbackMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMessage {
    pub from_id: i64,
    pub peer_id: i64,
    pub id: i64,
    #[serde(default)]
    pub text: String,
}

/// One decoded callback. Owned, so it can outlive the request that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventType,
    pub protocol_version: String,
    pub secret: String,
    /// VK user who wrote the message (`from_id`).
    pub sender_id: i64,
    /// Conversation to answer in (`peer_id`).
    pub conversation_id: i64,
    /// Message id, echoed back as `reply_to`.
    pub correlation_id: i64,
    pub text: String,
}

/// Reasons a callback is refused before any business logic runs.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed callback body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("message_new callback without object.message")]
    MissingMessage,
    #[error("unsupported callback api version {got:?}; set it to {expected:?}")]
    UnsupportedVersion { got: String, expected: &'static str },
    #[error("incorrect secret")]
    BadSecret,
}

impl InboundEvent {
    /// Decode a callback body. `message_new` must carry `object.message`; other types may omit it.
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let req: CallbackRequest = serde_json::from_slice(body)?;
        let message = req.object.and_then(|o| o.message);
        let (sender_id, conversation_id, correlation_id, text) = match message {
            Some(m) => (m.from_id, m.peer_id, m.id, m.text),
            None if req.typ == EventType::MessageNew => return Err(ProtocolError::MissingMessage),
            None => (0, 0, 0, String::new()),
        };
        Ok(Self {
            kind: req.typ,
            protocol_version: req.v,
            secret: req.secret,
            sender_id,
            conversation_id,
            correlation_id,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_message_new() {
        let body = br#"{"type":"message_new","v":"5.131","secret":"S","group_id":1,
            "object":{"message":{"from_id":7,"peer_id":2000000001,"id":3,"text":"/who","date":0},
            "client_info":{}}}"#;
        let e = InboundEvent::decode(body).unwrap();
        assert_eq!(e.kind, EventType::MessageNew);
        assert_eq!(e.protocol_version, "5.131");
        assert_eq!(e.secret, "S");
        assert_eq!(e.sender_id, 7);
        assert_eq!(e.conversation_id, 2000000001);
        assert_eq!(e.correlation_id, 3);
        assert_eq!(e.text, "/who");
    }

    #[test]
    fn decode_confirmation_without_object() {
        let e = InboundEvent::decode(br#"{"type":"confirmation","v":"5.131","group_id":1}"#).unwrap();
        assert_eq!(e.kind, EventType::Confirmation);
        assert_eq!(e.secret, "");
    }

    #[test]
    fn unknown_type_is_other() {
        let e = InboundEvent::decode(
            br#"{"type":"group_join","v":"5.131","secret":"S","object":{"user_id":1,"join_type":"join"}}"#,
        )
        .unwrap();
        assert_eq!(e.kind, EventType::Other);
    }

    #[test]
    fn message_new_without_message_is_rejected() {
        assert!(matches!(
            InboundEvent::decode(br#"{"type":"message_new","v":"5.131","secret":"S","object":{}}"#),
            Err(ProtocolError::MissingMessage)
        ));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(matches!(InboundEvent::decode(b"not json"), Err(ProtocolError::Decode(_))));
        assert!(matches!(InboundEvent::decode(br#"{"v":"5.131"}"#), Err(ProtocolError::Decode(_))));
        assert!(matches!(
            InboundEvent::decode(br#"{"type":"message_new","v":"5.131","object":{"message":{"from_id":"x"}}}"#),
            Err(ProtocolError::Decode(_))
        ));
    }
}
