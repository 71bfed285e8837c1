use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider implementation
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            model,
            timeout,
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SuggestionProvider for AnthropicProvider {
    async fn suggest(&self, nicknames: &[String]) -> SuggestResult<Vec<String>> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: 512,
            system: SUGGESTION_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: nicknames_message(nicknames),
            }],
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| SuggestError::Timeout(self.timeout))?
        .map_err(|e| SuggestError::ApiError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SuggestError::InvalidCredential);
        }
        if !status.is_success() {
            return Err(SuggestError::ApiError(format!(
                "Anthropic API returned status: {status}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SuggestError::ParseError(e.to_string()))?;

        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.clone())
            .ok_or_else(|| SuggestError::ParseError("No text content in response".to_string()))?;

        parse_suggestions(&text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_messages_api() {
        let request = MessagesRequest {
            model: "claude-haiku-4-5-20251001",
            max_tokens: 512,
            system: SUGGESTION_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: nicknames_message(&["Ann".into()]),
            }],
        };
        let body = serde_json::to_string(&request).unwrap();
        assert!(body.contains("\"max_tokens\":512"));
        assert!(body.contains("\"role\":\"user\""));
        assert!(body.contains("Player names: Ann"));
    }

    #[test]
    fn response_text_block_is_extracted() {
        let payload = r#"{
            "content": [
                {"type": "thinking", "text": ""},
                {"type": "text", "text": "[\"one\", \"two\"]"}
            ]
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(payload).unwrap();
        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.clone())
            .unwrap();
        assert_eq!(parse_suggestions(&text).unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    #[ignore] // Only run with actual API key
    async fn test_anthropic_suggest() {
        let api_key = std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY not set");
        let provider = AnthropicProvider::new(
            api_key,
            "claude-haiku-4-5-20251001".to_string(),
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
