// Narration audio
//
// - SpeechSynthesizer: text in, encoded audio bytes out (OpenAI text-to-speech)
// - Stage: per-slide synthesis validated against the audio fingerprint cache

pub mod openai;
pub mod stage;

use async_trait::async_trait;

pub use openai::OpenAiSynthesizer;
pub use stage::{AudioStage, SlideAudio};

use crate::config::SpeechConfig;
use crate::error::Result;

/// External speech synthesizer consumed by the audio stage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Encoded audio for `text`, in the container the synthesizer was configured for.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create_synthesizer(config: SpeechConfig) -> Result<Box<dyn SpeechSynthesizer>> {
        Ok(Box::new(OpenAiSynthesizer::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::SlidecastError;

    #[test]
    fn test_factory_requires_api_key() {
        let mut config = Config::default().speech;
        config.api_key_env = "SLIDECAST_TEST_NO_SUCH_KEY".to_string();
        let result = SynthesizerFactory::create_synthesizer(config);
        assert!(matches!(result, Err(SlidecastError::Config(_))));
    }
}
