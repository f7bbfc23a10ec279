use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::HashStore;
use crate::cancel::CancellationToken;
use crate::error::{Result, SlidecastError};
use crate::language::display_name;
use crate::layout::WorkspaceLayout;
use crate::narration::{LanguageTrack, NarrationUnit, read_cached_texts, write_texts};
use crate::progress::{LanguageStage, ProgressSink};
use super::Translator;

/// Produces the narration track of one language from the input-language track.
pub struct TranslationStage {
    translator: Arc<dyn Translator>,
    layout: WorkspaceLayout,
    requests: Arc<Semaphore>,
    progress: Arc<dyn ProgressSink>,
}

impl TranslationStage {
    pub fn new(
        translator: Arc<dyn Translator>,
        layout: WorkspaceLayout,
        requests: Arc<Semaphore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            translator,
            layout,
            requests,
            progress,
        }
    }

    /// Translate `base` into `target`.
    ///
    /// Slides whose source fingerprint matches the cached one reuse the cached
    /// translation; the rest are translated concurrently and reassembled in slide
    /// order. Any failed slide fails the whole track and nothing is persisted.
    pub async fn translate(
        &self,
        base: &LanguageTrack,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<LanguageTrack> {
        let total = base.len();

        if target == base.language {
            debug!("[{}] Input language, nothing to translate", target);
            self.progress.slide_finished(target, LanguageStage::Translating, total, total);
            return Ok(LanguageTrack::new(target, base.units.clone()));
        }

        let store = HashStore::at(self.layout.text_dir(target));
        let narration_path = self.layout.translated_narration(target);
        let cached_fingerprints = store.load();
        let mut cached_texts = read_cached_texts(&narration_path);
        if cached_texts.len() != cached_fingerprints.len() {
            if !cached_texts.is_empty() || !cached_fingerprints.is_empty() {
                warn!(
                    "[{}] Cached translation has {} slides but {} fingerprints, ignoring it",
                    target,
                    cached_texts.len(),
                    cached_fingerprints.len()
                );
            }
            cached_texts.clear();
        }

        let mut translated: Vec<Option<String>> = base
            .units
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let valid = HashStore::cached_at(&cached_fingerprints, i) == Some(unit.fingerprint.as_str());
                if valid { cached_texts.get(i).cloned() } else { None }
            })
            .collect();

        let reused = translated.iter().filter(|t| t.is_some()).count();
        info!("[{}] Reusing {}/{} cached translations", target, reused, total);

        let language_name = display_name(target);
        let mut done = reused;
        let mut tasks = JoinSet::new();

        for (index, unit) in base.units.iter().enumerate() {
            if translated[index].is_some() {
                continue;
            }
            if unit.is_blank() {
                translated[index] = Some(String::new());
                done += 1;
                continue;
            }

            let translator = Arc::clone(&self.translator);
            let requests = Arc::clone(&self.requests);
            let cancel = cancel.clone();
            let text = unit.text.clone();
            let language_name = language_name.clone();

            tasks.spawn(async move {
                let result = cancel
                    .run(async {
                        let _permit = requests.acquire().await.map_err(|e| {
                            SlidecastError::Translation(format!("Request limiter closed: {}", e))
                        })?;
                        translator.translate_one(&text, &language_name).await
                    })
                    .await;
                (index, result)
            });
        }
        self.progress.slide_finished(target, LanguageStage::Translating, done, total);

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined
                .map_err(|e| SlidecastError::Translation(format!("Translation task failed: {}", e)))?;
            match result {
                Ok(text) => {
                    debug!("[{}] Slide {} translated", target, index + 1);
                    translated[index] = Some(text);
                    done += 1;
                    self.progress.slide_finished(target, LanguageStage::Translating, done, total);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(match e {
                        SlidecastError::Cancelled(_) => e,
                        other => SlidecastError::Translation(format!("slide {}: {}", index + 1, other)),
                    });
                }
            }
        }

        let units = base
            .units
            .iter()
            .zip(translated)
            .map(|(unit, text)| {
                text.map(|t| NarrationUnit::translated(t, unit)).ok_or_else(|| {
                    SlidecastError::Translation(format!("Missing translation for {}", target))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let track = LanguageTrack::new(target, units);

        if reused < total || cached_fingerprints.len() != total {
            write_texts(&narration_path, &track.texts())
                .map_err(|e| SlidecastError::Cache(format!("Failed to save translation: {}", e)))?;
            store.save(&track.fingerprints())?;
        }

        info!("[{}] Translation ready ({} new)", target, total - reused);
        Ok(track)
    }
}
