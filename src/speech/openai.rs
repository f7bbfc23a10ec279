use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::{Result, SlidecastError};
use crate::openai::OpenAiClient;
use super::SpeechSynthesizer;

/// Synthesizer backed by the OpenAI `audio/speech` endpoint.
pub struct OpenAiSynthesizer {
    client: OpenAiClient,
    config: SpeechConfig,
}

impl OpenAiSynthesizer {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = OpenAiClient::new(
            &config.endpoint,
            &config.api_key_env,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "input": text,
            "response_format": self.config.format,
        });

        debug!("Synthesizing {} chars with voice {}", text.len(), self.config.voice);
        let mut response = self
            .client
            .post_json("audio/speech", &request, SlidecastError::Speech)
            .await?;

        let mut audio = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SlidecastError::Speech(format!("Failed to read audio stream: {}", e)))?
        {
            audio.extend_from_slice(&chunk);
        }

        if audio.is_empty() {
            return Err(SlidecastError::Speech("Empty audio received".to_string()));
        }
        Ok(audio)
    }
}
