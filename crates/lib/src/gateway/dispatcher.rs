//! Callback dispatcher: gatekeeping for every request, then command execution and reply for
//! `message_new` events from authorized senders.

use crate::channels::{ReplyPayload, ReplySender, VK_API_VERSION};
use crate::config::Config;
use crate::credentials::CredentialTable;
use crate::gateway::protocol::{EventType, InboundEvent, ProtocolError};
use crate::sanitize::sanitize;
use crate::tshock::CommandExecutor;
use std::sync::Arc;

/// Immutable per-process relay settings, resolved from the config at startup.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub secret: String,
    pub confirmation_token: String,
    pub command_prefix: String,
    pub sanitize_output: bool,
    pub no_output_message: String,
    pub failure_message: String,
    pub keyboard: Option<serde_json::Value>,
}

impl RelaySettings {
    /// `command_prefix` is passed separately since it may come from TShock's `CommandSpecifier`.
    pub fn from_config(config: &Config, command_prefix: impl Into<String>) -> Self {
        Self {
            secret: config.vk.secret.clone(),
            confirmation_token: config.vk.confirmation_token.clone(),
            command_prefix: command_prefix.into(),
            sanitize_output: config.remove_chat_tags,
            no_output_message: config.messages.no_command_output.clone(),
            failure_message: config.messages.rest_request_failed.clone(),
            keyboard: config.vk.keyboard.clone(),
        }
    }
}

/// What the HTTP layer should answer once a callback passed the gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Confirmation handshake: answer with this token and do nothing else.
    Confirm(String),
    /// Answer `ok` and hand the event to [`Dispatcher::handle_event`].
    Process(InboundEvent),
}

/// How a processed event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotAMessage,
    NotACommand,
    Unauthorized,
    Replied,
    ReplyFailed,
}

pub struct Dispatcher {
    settings: RelaySettings,
    credentials: Arc<CredentialTable>,
    executor: Arc<dyn CommandExecutor>,
    replies: Arc<dyn ReplySender>,
}

impl Dispatcher {
    pub fn new(
        settings: RelaySettings,
        credentials: Arc<CredentialTable>,
        executor: Arc<dyn CommandExecutor>,
        replies: Arc<dyn ReplySender>,
    ) -> Self {
        Self {
            settings,
            credentials,
            executor,
            replies,
        }
    }

    /// Decode, then check version, then secret. Nothing here touches the network.
    pub fn accept(&self, body: &[u8]) -> Result<Acceptance, ProtocolError> {
        let event = InboundEvent::decode(body)?;
        if event.protocol_version != VK_API_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                got: event.protocol_version,
                expected: VK_API_VERSION,
            });
        }
        if event.secret != self.settings.secret {
            return Err(ProtocolError::BadSecret);
        }
        if event.kind == EventType::Confirmation {
            return Ok(Acceptance::Confirm(self.settings.confirmation_token.clone()));
        }
        Ok(Acceptance::Process(event))
    }

    /// Run an accepted event: prefix check, sender lookup, command, reply. Errors are logged and
    /// turned into the configured failure reply; nothing propagates to the caller.
    pub async fn handle_event(&self, event: InboundEvent) -> Outcome {
        if event.kind != EventType::MessageNew {
            return Outcome::NotAMessage;
        }
        if !event.text.starts_with(&self.settings.command_prefix) {
            return Outcome::NotACommand;
        }
        let Some(entry) = self.credentials.lookup(event.sender_id) else {
            log::debug!("ignoring command from unauthorized VK id {}", event.sender_id);
            return Outcome::Unauthorized;
        };

        let body = match self.executor.execute(&entry.credential, &event.text).await {
            Ok(result) => {
                log::info!(
                    "{} ({}) executed {}",
                    entry.display_name,
                    entry.display_group,
                    event.text
                );
                let text = result.text();
                let text = if self.settings.sanitize_output {
                    sanitize(&text)
                } else {
                    text
                };
                // Blank lines or tag-only output leave nothing VK would accept.
                if text.is_empty() {
                    self.settings.no_output_message.clone()
                } else {
                    text
                }
            }
            Err(e) => {
                log::warn!("failed to execute {:?}: {}", event.text, e);
                self.settings.failure_message.clone()
            }
        };

        let reply = ReplyPayload {
            body,
            conversation_id: event.conversation_id,
            correlation_id: event.correlation_id,
            keyboard: self.settings.keyboard.clone(),
        };
        match self.replies.send(&reply).await {
            Ok(()) => Outcome::Replied,
            Err(e) => {
                log::warn!("failed to send VK reply to peer {}: {}", reply.conversation_id, e);
                Outcome::ReplyFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::VkError;
    use crate::credentials::CredentialEntry;
    use crate::tshock::{CommandResult, RestError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeExecutor {
        output: Option<Vec<String>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CommandExecutor for FakeExecutor {
        async fn execute(&self, credential: &str, command: &str) -> Result<CommandResult, RestError> {
            self.calls
                .lock()
                .unwrap()
                .push((credential.to_string(), command.to_string()));
            match &self.output {
                Some(lines) => Ok(CommandResult {
                    output_lines: lines.clone(),
                }),
                None => Err(RestError::Remote("Not authorized.".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeSender {
        fail: bool,
        sent: Mutex<Vec<ReplyPayload>>,
    }

    #[async_trait]
    impl ReplySender for FakeSender {
        async fn send(&self, reply: &ReplyPayload) -> Result<(), VkError> {
            self.sent.lock().unwrap().push(reply.clone());
            if self.fail {
                return Err(VkError::Remote {
                    details: "flood control".to_string(),
                });
            }
            Ok(())
        }
    }

    fn settings() -> RelaySettings {
        RelaySettings {
            secret: "S".to_string(),
            confirmation_token: "confirm-me".to_string(),
            command_prefix: "/".to_string(),
            sanitize_output: true,
            no_output_message: "no output".to_string(),
            failure_message: "rest failed".to_string(),
            keyboard: None,
        }
    }

    fn table() -> Arc<CredentialTable> {
        Arc::new(CredentialTable::from_entries(vec![CredentialEntry {
            credential: "tok1".to_string(),
            display_name: "alice".to_string(),
            display_group: "superadmin".to_string(),
            sender_id: 7,
        }]))
    }

    fn dispatcher(
        settings: RelaySettings,
        exec: Arc<FakeExecutor>,
        sender: Arc<FakeSender>,
    ) -> Dispatcher {
        Dispatcher::new(settings, table(), exec, sender)
    }

    fn message(from: i64, text: &str) -> InboundEvent {
        InboundEvent {
            kind: EventType::MessageNew,
            protocol_version: VK_API_VERSION.to_string(),
            secret: "S".to_string(),
            sender_id: from,
            conversation_id: from,
            correlation_id: 3,
            text: text.to_string(),
        }
    }

    fn output(lines: &[&str]) -> Arc<FakeExecutor> {
        Arc::new(FakeExecutor {
            output: Some(lines.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        })
    }

    #[test]
    fn accept_rejects_wrong_version_then_secret() {
        let d = dispatcher(settings(), output(&[]), Arc::new(FakeSender::default()));
        let err = d
            .accept(br#"{"type":"message_new","v":"5.103","secret":"wrong","object":{"message":{"from_id":7,"peer_id":7,"id":3,"text":"/who"}}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion { .. }));
        assert!(err.to_string().contains("5.131"));

        let err = d
            .accept(br#"{"type":"confirmation","v":"5.131","secret":"wrong"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::BadSecret));
    }

    #[test]
    fn accept_confirmation_returns_token() {
        let d = dispatcher(settings(), output(&[]), Arc::new(FakeSender::default()));
        let a = d
            .accept(br#"{"type":"confirmation","v":"5.131","secret":"S","object":{"message":{"from_id":1,"peer_id":1,"id":1,"text":"/x"}}}"#)
            .unwrap();
        assert_eq!(a, Acceptance::Confirm("confirm-me".to_string()));
    }

    #[tokio::test]
    async fn authorized_command_replies_with_joined_output() {
        let exec = output(&["Player1", "Player2"]);
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), exec.clone(), sender.clone());

        assert_eq!(d.handle_event(message(7, "/who")).await, Outcome::Replied);

        assert_eq!(
            *exec.calls.lock().unwrap(),
            vec![("tok1".to_string(), "/who".to_string())]
        );
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Player1\nPlayer2");
        assert_eq!(sent[0].conversation_id, 7);
        assert_eq!(sent[0].correlation_id, 3);
    }

    #[tokio::test]
    async fn empty_output_uses_no_output_message() {
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), output(&[]), sender.clone());
        d.handle_event(message(7, "/save")).await;
        assert_eq!(sender.sent.lock().unwrap()[0].body, "no output");
    }

    #[tokio::test]
    async fn blank_output_line_uses_no_output_message() {
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), output(&[""]), sender.clone());
        assert_eq!(d.handle_event(message(7, "/save")).await, Outcome::Replied);
        assert_eq!(sender.sent.lock().unwrap()[0].body, "no output");
    }

    #[tokio::test]
    async fn tag_only_output_uses_no_output_message() {
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), output(&["[i:29]", "[a:1]"]), sender.clone());
        d.handle_event(message(7, "/item")).await;
        assert_eq!(sender.sent.lock().unwrap()[0].body, "no output");

        let mut raw = settings();
        raw.sanitize_output = false;
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(raw, output(&["[i:29]"]), sender.clone());
        d.handle_event(message(7, "/item")).await;
        assert_eq!(sender.sent.lock().unwrap()[0].body, "[i:29]");
    }

    #[tokio::test]
    async fn failed_command_uses_failure_message() {
        let exec = Arc::new(FakeExecutor::default());
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), exec, sender.clone());
        assert_eq!(d.handle_event(message(7, "/who")).await, Outcome::Replied);
        assert_eq!(sender.sent.lock().unwrap()[0].body, "rest failed");
    }

    #[tokio::test]
    async fn chat_tags_stripped_only_when_enabled() {
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), output(&["[c/ff0000:Red] [i:29]"]), sender.clone());
        d.handle_event(message(7, "/motd")).await;
        assert_eq!(sender.sent.lock().unwrap()[0].body, "Red ");

        let mut raw = settings();
        raw.sanitize_output = false;
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(raw, output(&["[c/ff0000:Red]"]), sender.clone());
        d.handle_event(message(7, "/motd")).await;
        assert_eq!(sender.sent.lock().unwrap()[0].body, "[c/ff0000:Red]");
    }

    #[tokio::test]
    async fn unauthorized_sender_is_ignored() {
        let exec = output(&["x"]);
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), exec.clone(), sender.clone());
        assert_eq!(d.handle_event(message(8, "/who")).await, Outcome::Unauthorized);
        assert!(exec.calls.lock().unwrap().is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_without_prefix_is_ignored() {
        let exec = output(&["x"]);
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), exec.clone(), sender.clone());
        assert_eq!(d.handle_event(message(7, "hello")).await, Outcome::NotACommand);
        assert!(exec.calls.lock().unwrap().is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_event_types_do_nothing() {
        let exec = output(&["x"]);
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(settings(), exec.clone(), sender.clone());
        let mut e = message(7, "/who");
        e.kind = EventType::Other;
        assert_eq!(d.handle_event(e).await, Outcome::NotAMessage);
        assert!(exec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_failure_is_reported_not_raised() {
        let sender = Arc::new(FakeSender {
            fail: true,
            ..Default::default()
        });
        let d = dispatcher(settings(), output(&["x"]), sender.clone());
        assert_eq!(d.handle_event(message(7, "/who")).await, Outcome::ReplyFailed);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn keyboard_is_attached_to_replies() {
        let mut s = settings();
        s.keyboard = Some(serde_json::json!({ "buttons": [] }));
        let sender = Arc::new(FakeSender::default());
        let d = dispatcher(s, output(&["x"]), sender.clone());
        d.handle_event(message(7, "/who")).await;
        assert_eq!(
            sender.sent.lock().unwrap()[0].keyboard,
            Some(serde_json::json!({ "buttons": [] }))
        );
    }
}
