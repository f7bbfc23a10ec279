// Narration translation
//
// - Translator: one text in, one text out, implemented against the OpenAI chat API
// - Stage: per-language track translation with fingerprint-validated reuse

pub mod openai;
pub mod stage;

use async_trait::async_trait;

pub use openai::OpenAiTranslator;
pub use stage::TranslationStage;

use crate::config::TranslateConfig;
use crate::error::Result;

/// External translator consumed by the translation stage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into the language called `target_language` (an English name such as "French").
    async fn translate_one(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Box<dyn Translator>> {
        Ok(Box::new(OpenAiTranslator::new(config)?))
    }
}
