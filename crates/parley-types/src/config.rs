//! Global configuration types for Parley.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls which
//! model answers, how the dialogue is framed, and who owns new chats.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderType;

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Owner id stamped on chats created from this machine.
    #[serde(default = "default_owner_id")]
    pub owner_id: String,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub framing: FramingConfig,
}

fn default_owner_id() -> String {
    "local".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            model: ModelSettings::default(),
            framing: FramingConfig::default(),
        }
    }
}

/// Which model answers and how much it may say per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_provider")]
    pub provider: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override for the provider's API base URL (proxies, test servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_provider() -> ProviderType {
    ProviderType::Anthropic
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: None,
        }
    }
}

/// Persona names and preamble used to frame a conversation as a transcript.
///
/// The preamble may contain `{initiator}` and `{responder}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingConfig {
    #[serde(default = "default_initiator_name")]
    pub initiator_name: String,

    #[serde(default = "default_responder_name")]
    pub responder_name: String,

    #[serde(default = "default_preamble")]
    pub preamble: String,
}

fn default_initiator_name() -> String {
    "friend 1".to_string()
}

fn default_responder_name() -> String {
    "friend 2".to_string()
}

fn default_preamble() -> String {
    "The following is a conversation between {initiator} and {responder}.\n\n".to_string()
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            initiator_name: default_initiator_name(),
            responder_name: default_responder_name(),
            preamble: default_preamble(),
        }
    }
}
