//! LLM provider implementations.
//!
//! Contains the concrete Anthropic implementation of the [`LlmProvider`]
//! trait defined in `parley-core`, plus a factory ([`create_provider`]) that
//! builds the configured provider from [`ModelSettings`].
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod anthropic;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_types::config::ModelSettings;
use parley_types::llm::{LlmError, ProviderType};

use self::anthropic::AnthropicProvider;

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Create a [`BoxLlmProvider`] from [`ModelSettings`].
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when no API key is available,
/// or a provider error if the HTTP client cannot be built.
pub fn create_provider(
    settings: &ModelSettings,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    match settings.provider {
        ProviderType::Anthropic => {
            let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
            let mut provider = AnthropicProvider::new(key, settings.model.clone())?;
            if let Some(base_url) = settings.base_url.as_deref() {
                provider = provider.with_base_url(base_url.to_string());
            }
            Ok(BoxLlmProvider::new(provider))
        }
    }
}

/// Read the API key for `provider` from the environment.
///
/// Blank values count as missing.
pub fn api_key_from_env(provider: ProviderType) -> Option<SecretString> {
    let var = match provider {
        ProviderType::Anthropic => ANTHROPIC_API_KEY_VAR,
    };
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_anthropic() {
        let settings = ModelSettings::default();
        let provider =
            create_provider(&settings, Some(SecretString::from("sk-test-key"))).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert!(provider.capabilities().stop_sequences);
    }

    #[test]
    fn test_create_provider_with_base_url() {
        let settings = ModelSettings {
            base_url: Some("http://localhost:4010".to_string()),
            ..ModelSettings::default()
        };
        let provider =
            create_provider(&settings, Some(SecretString::from("sk-test-key"))).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_create_provider_missing_key() {
        let err = create_provider(&ModelSettings::default(), None).unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed));
    }
}
