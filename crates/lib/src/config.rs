//! Configuration types and loading.
//!
//! Config is loaded from a YAML file (default `./config.yaml`, or `TSVK_CONFIG_PATH`). Keys are
//! PascalCase. Missing keys keep their defaults; a missing file can be created with defaults so a
//! first run leaves an editable template behind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the relay config when neither a flag nor `TSVK_CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Default VK API method root.
pub const DEFAULT_VK_API_BASE: &str = "https://api.vk.com/method";

/// Top-level relay config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Config {
    /// Port the callback server listens on (default 80).
    pub port: u16,

    /// Path to TShock's `config.json`; REST tokens and defaults are read from it.
    #[serde(rename = "TShockConfigPath")]
    pub tshock_config_path: String,

    /// Messages must start with this to be treated as commands. Empty means TShock's `CommandSpecifier`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command_prefix: String,

    /// TShock REST root. Empty means `http://127.0.0.1:<RestApiPort>` from the TShock config.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rest_addr: String,

    /// Strip Terraria chat tags (`[c/ff0000:text]`, `[i:29]`) from command output.
    pub remove_chat_tags: bool,

    /// Request path VK posts callbacks to.
    pub webhook_path: String,

    /// Timeout for TShock REST calls. Unset means no timeout beyond the transport's own.
    pub rest_timeout_seconds: Option<u64>,

    #[serde(rename = "VK")]
    pub vk: VkConfig,

    pub messages: MessagesConfig,
}

/// VK community (Callback API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct VkConfig {
    /// String VK expects back from the `confirmation` event.
    pub confirmation_token: String,
    /// Secret key VK includes in every callback.
    pub secret: String,
    /// Keyboard object attached to every reply, sent as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<serde_json::Value>,
    /// Community access token. Overridden by VK_TOKEN env when set.
    pub token: String,
    pub api_base: String,
}

/// User-facing reply texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MessagesConfig {
    pub no_command_output: String,
    pub rest_request_failed: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 80,
            tshock_config_path: String::new(),
            command_prefix: String::new(),
            rest_addr: String::new(),
            remove_chat_tags: true,
            webhook_path: "/".to_string(),
            rest_timeout_seconds: None,
            vk: VkConfig::default(),
            messages: MessagesConfig::default(),
        }
    }
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            confirmation_token: String::new(),
            secret: String::new(),
            keyboard: None,
            token: String::new(),
            api_base: DEFAULT_VK_API_BASE.to_string(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            no_command_output: "Command didn't return anything.".to_string(),
            rest_request_failed: "REST Api malfunction, check Terraria Server logs".to_string(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TSVK_CONFIG_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Resolve the VK access token: env VK_TOKEN overrides config.
pub fn resolve_vk_token(config: &Config) -> Option<String> {
    std::env::var("VK_TOKEN")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            let t = config.vk.token.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
}

/// Load config from `path`. When the file is missing and `create_if_missing` is set, the defaults
/// are written there and returned.
pub fn load_config(path: &Path, create_if_missing: bool) -> Result<Config> {
    if !path.exists() {
        if !create_if_missing {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let config = Config::default();
        write_config(path, &config)?;
        log::info!("created default config at {}", path.display());
        return Ok(config);
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing config from {}", path.display()))
}

/// Parse YAML config text; absent keys keep their defaults. An empty document yields the defaults.
pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let yaml = serde_yaml::to_string(config).context("serializing default config")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("writing default config to {}", path.display()))
}

/// Check the values the relay cannot start without.
pub fn validate(config: &Config) -> Result<()> {
    if config.tshock_config_path.trim().is_empty() {
        anyhow::bail!(
            "TShockConfigPath is not set. Make sure --config-path points at the right file and TShockConfigPath is set there"
        );
    }
    if resolve_vk_token(config).is_none() {
        anyhow::bail!("VK group access token is not set in config (VK.Token or VK_TOKEN)");
    }
    if !config.webhook_path.starts_with('/') {
        anyhow::bail!("WebhookPath must start with '/': {:?}", config.webhook_path);
    }
    Ok(())
}
