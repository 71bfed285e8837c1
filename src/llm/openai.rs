use super::*;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// OpenAI provider implementation
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self {
            client,
            model,
            timeout,
        }
    }
}

fn map_openai_error(error: OpenAIError) -> SuggestError {
    if let OpenAIError::ApiError(api) = &error {
        let code = api.code.clone().unwrap_or_default();
        if code == "invalid_api_key" || api.message.contains("Incorrect API key") {
            return SuggestError::InvalidCredential;
        }
    }
    SuggestError::ApiError(error.to_string())
}

#[async_trait]
impl SuggestionProvider for OpenAiProvider {
    async fn suggest(&self, nicknames: &[String]) -> SuggestResult<Vec<String>> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(512u32)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SUGGESTION_SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| SuggestError::ApiError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(nicknames_message(nicknames))
                    .build()
                    .map_err(|e| SuggestError::ApiError(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| SuggestError::ApiError(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| SuggestError::Timeout(self.timeout))?
            .map_err(map_openai_error)?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| SuggestError::ParseError("No content in response".to_string()))?;

        parse_suggestions(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Only run with actual API key
    async fn test_openai_suggest() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiProvider::new(
            api_key,
            "gpt-4o-mini".to_string(),
            Duration::from_secs(10),
        );

        let suggestions = provider
            .suggest(&["Ann".to_string(), "Ben".to_string()])
            .await
            .unwrap();
        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        println!("Suggestions: {suggestions:?}");
    }
}
