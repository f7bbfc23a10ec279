use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, SlidecastError};
use crate::openai::OpenAiClient;
use super::Translator;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Translator backed by the OpenAI chat completions endpoint.
pub struct OpenAiTranslator {
    client: OpenAiClient,
    config: TranslateConfig,
}

impl OpenAiTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = OpenAiClient::new(
            &config.endpoint,
            &config.api_key_env,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self { client, config })
    }

    fn build_system_prompt(target_language: &str) -> String {
        format!(
            "You are a professional translator of presentation narration.\n\
             Translate the user's text into {} ONLY.\n\
             Keep line breaks, numbers and product names as they are.\n\
             Reply with the translation and nothing else: no quotes, notes or alternatives.",
            target_language
        )
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate_one(&self, text: &str, target_language: &str) -> Result<String> {
        let request = json!({
            "model": self.config.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": Self::build_system_prompt(target_language) },
                { "role": "user", "content": text },
            ],
        });

        debug!("Translating {} chars to {}", text.len(), target_language);
        let response = self
            .client
            .post_json("chat/completions", &request, SlidecastError::Translation)
            .await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SlidecastError::Translation(format!("Failed to parse response: {}", e)))?;

        let translation = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if translation.is_empty() {
            return Err(SlidecastError::Translation("Empty translation received".to_string()));
        }
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_language() {
        let prompt = OpenAiTranslator::build_system_prompt("Japanese");
        assert!(prompt.contains("into Japanese ONLY"));
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":" Bonjour \n"}}]}"#;
        let chat: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref().map(str::trim), Some("Bonjour"));
    }
}
