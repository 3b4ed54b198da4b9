//! Reader for TShock's own `config.json`.
//!
//! TShock 4.5 moved every option under a top-level `"Settings"` object; older servers keep them at
//! the top level. Both layouts are accepted: the nested one is tried first and the flat one is used
//! when it yields no `ApplicationRestTokens`.

use crate::credentials::{CredentialEntry, CredentialTable};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Display data TShock stores next to each application REST token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RestTokenInfo {
    pub username: String,
    pub user_group_name: String,
    /// VK user id allowed to use this token. Tokens without one are not reachable from VK.
    #[serde(rename = "VKId")]
    pub vk_id: Option<i64>,
}

/// The subset of TShock settings the relay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TShockConfig {
    pub rest_api_enabled: bool,
    pub rest_api_port: u16,
    pub command_specifier: String,
    /// Token -> info, in file order.
    pub application_rest_tokens: Vec<(String, RestTokenInfo)>,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct RawSettings {
    rest_api_enabled: bool,
    rest_api_port: u16,
    command_specifier: String,
    application_rest_tokens: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            rest_api_enabled: false,
            rest_api_port: 7878,
            command_specifier: "/".to_string(),
            application_rest_tokens: None,
        }
    }
}

impl TShockConfig {
    /// `http://127.0.0.1:<RestApiPort>`, used when the relay config leaves RestAddr empty.
    pub fn local_rest_addr(&self) -> String {
        format!("http://127.0.0.1:{}", self.rest_api_port)
    }

    /// Sender-indexed credential table from the tokens that carry a VK id.
    pub fn credential_table(&self) -> CredentialTable {
        CredentialTable::from_entries(self.application_rest_tokens.iter().filter_map(
            |(token, info)| {
                let sender_id = info.vk_id?;
                Some(CredentialEntry {
                    credential: token.clone(),
                    display_name: info.username.clone(),
                    display_group: info.user_group_name.clone(),
                    sender_id,
                })
            },
        ))
    }
}

/// Read and parse TShock's config file.
pub fn load_tshock_config(path: &Path) -> Result<TShockConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading tshock config from {}", path.display()))?;
    parse_tshock_config(&s).with_context(|| format!("parsing tshock config from {}", path.display()))
}

/// Parse either TShock config layout.
pub fn parse_tshock_config(s: &str) -> Result<TShockConfig> {
    let value: serde_json::Value = serde_json::from_str(s)?;
    let nested: Option<RawSettings> = match value.get("Settings") {
        Some(settings) if !settings.is_null() => Some(serde_json::from_value(settings.clone())?),
        _ => None,
    };
    let raw = match nested {
        Some(settings) if settings.application_rest_tokens.is_some() => settings,
        _ => {
            log::debug!("tshock config has no Settings.ApplicationRestTokens, reading pre-4.5 layout");
            serde_json::from_value(value)?
        }
    };

    let mut tokens = Vec::new();
    for (token, info) in raw.application_rest_tokens.unwrap_or_default() {
        let info: RestTokenInfo = serde_json::from_value(info)
            .with_context(|| format!("reading ApplicationRestTokens entry for {:?}", token))?;
        tokens.push((token, info));
    }

    Ok(TShockConfig {
        rest_api_enabled: raw.rest_api_enabled,
        rest_api_port: raw.rest_api_port,
        command_specifier: raw.command_specifier,
        application_rest_tokens: tokens,
    })
}
