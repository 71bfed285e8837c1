//! Prompt suggestion collaborator: given the lobby's nicknames, a
//! provider returns a handful of prompt ideas the host can add to the
//! pool. Entirely optional — an unconfigured or failing provider never
//! blocks the game.

mod anthropic;
mod openai;

use async_trait::async_trait;
use std::time::Duration;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Result type for suggestion operations
pub type SuggestResult<T> = Result<T, SuggestError>;

/// Most suggestions a provider will return per request.
pub const MAX_SUGGESTIONS: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("no text-generation credential configured")]
    NotConfigured,

    #[error("credential rejected by the provider")]
    InvalidCredential,

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// The contract both providers target: a strict JSON array of short
/// prompt strings, nothing else.
pub(crate) const SUGGESTION_SYSTEM_PROMPT: &str = "You generate short, funny GIF-search prompts \
    for a party game. Each prompt should be 5-12 words, starting with \"When\", \"Me\", or \
    \"That moment when\". Make some reference the player names provided. Output ONLY a valid \
    JSON array of 6 strings, no other text.";

pub(crate) fn nicknames_message(nicknames: &[String]) -> String {
    let list = if nicknames.is_empty() {
        "the players".to_string()
    } else {
        nicknames.join(", ")
    };
    format!("Player names: {list}")
}

/// Parse a provider's raw answer into clean suggestions.
pub(crate) fn parse_suggestions(text: &str) -> SuggestResult<Vec<String>> {
    let parsed: Vec<String> =
        serde_json::from_str(text.trim()).map_err(|e| SuggestError::ParseError(e.to_string()))?;
    Ok(parsed
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect())
}

/// Trait all suggestion providers implement
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Generate up to [`MAX_SUGGESTIONS`] prompt ideas for these players.
    async fn suggest(&self, nicknames: &[String]) -> SuggestResult<Vec<String>>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Configuration for suggestion providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            anthropic_model: "claude-haiku-4-5-20251001".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            anthropic_model: non_empty_env("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            timeout: non_empty_env("SUGGEST_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Build whichever provider has a credential, preferring Anthropic.
    /// [`SuggestError::NotConfigured`] is the explicit "no key" signal the
    /// lobby shows to the host.
    pub fn build_provider(&self) -> SuggestResult<Box<dyn SuggestionProvider>> {
        if let Some(key) = &self.anthropic_api_key {
            return Ok(Box::new(AnthropicProvider::new(
                key.clone(),
                self.anthropic_model.clone(),
                self.timeout,
            )));
        }
        if let Some(key) = &self.openai_api_key {
            return Ok(Box::new(OpenAiProvider::new(
                key.clone(),
                self.openai_model.clone(),
                self.timeout,
            )));
        }
        Err(SuggestError::NotConfigured)
    }
}
