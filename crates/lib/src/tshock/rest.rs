//! TShock REST client: run a raw console command under an application token.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const RAWCMD_PATH: &str = "/v3/server/rawcmd";

/// Output of one command, line by line as TShock reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub output_lines: Vec<String>,
}

impl CommandResult {
    /// Lines joined with `\n`, the way they are shown in chat.
    pub fn text(&self) -> String {
        self.output_lines.join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("tshock request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("tshock response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("tshock api error: {0}")]
    Remote(String),
}

/// Runs commands on the remote server. Implemented by [`RestClient`]; tests substitute fakes.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command` verbatim (prefix included) with the given REST token.
    async fn execute(&self, credential: &str, command: &str) -> Result<CommandResult, RestError>;
}

#[derive(Debug, Deserialize)]
struct RawCmdResponse {
    response: Vec<String>,
}

/// Client for TShock's REST API.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: reqwest::Client,
}

impl RestClient {
    /// `base_url` is e.g. `http://127.0.0.1:7878`; a trailing `/` is dropped. `timeout` bounds each
    /// request; `None` leaves reqwest's default in place.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, RestError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /v3/server/rawcmd?token=..&cmd=.. — one attempt, no retry.
    pub async fn raw_command(&self, token: &str, command: &str) -> Result<CommandResult, RestError> {
        let url = format!("{}{}", self.base_url, RAWCMD_PATH);
        let res = self
            .client
            .get(&url)
            .query(&[("token", token), ("cmd", command)])
            .send()
            .await?;
        let body = res.bytes().await?;
        decode_raw_command(&body)
    }
}

/// TShock reports failures as `{"status": "403", "error": "..."}`, sometimes with a 200 status,
/// so the `error` field is checked before looking for `response`.
fn decode_raw_command(body: &[u8]) -> Result<CommandResult, RestError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    match value.get("error") {
        Some(serde_json::Value::Null) | None => {}
        Some(serde_json::Value::String(s)) if s.is_empty() => {}
        Some(serde_json::Value::String(s)) => return Err(RestError::Remote(s.clone())),
        Some(other) => return Err(RestError::Remote(other.to_string())),
    }
    let data: RawCmdResponse = serde_json::from_value(value)?;
    Ok(CommandResult {
        output_lines: data.response,
    })
}

#[async_trait]
impl CommandExecutor for RestClient {
    async fn execute(&self, credential: &str, command: &str) -> Result<CommandResult, RestError> {
        self.raw_command(credential, command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = RestClient::new("http://127.0.0.1:7878/", None).unwrap();
        assert_eq!(c.base_url(), "http://127.0.0.1:7878");
    }

    #[test]
    fn decode_lines() {
        let r = decode_raw_command(br#"{"status":"200","response":["Player1","Player2"]}"#).unwrap();
        assert_eq!(r.output_lines, vec!["Player1", "Player2"]);
        assert_eq!(r.text(), "Player1\nPlayer2");
    }

    #[test]
    fn decode_empty_output_is_ok() {
        let r = decode_raw_command(br#"{"response":[]}"#).unwrap();
        assert!(r.output_lines.is_empty());
        assert_eq!(r.text(), "");
    }

    #[test]
    fn decode_error_field() {
        let err = decode_raw_command(br#"{"status":"403","error":"Not authorized."}"#).unwrap_err();
        assert!(matches!(err, RestError::Remote(ref m) if m == "Not authorized."));
    }

    #[test]
    fn decode_malformed() {
        assert!(matches!(
            decode_raw_command(b"<html>bad gateway</html>"),
            Err(RestError::Decode(_))
        ));
        assert!(matches!(
            decode_raw_command(br#"{"status":"200"}"#),
            Err(RestError::Decode(_))
        ));
        assert!(matches!(
            decode_raw_command(br#"{"response":"not a list"}"#),
            Err(RestError::Decode(_))
        ));
    }
}
