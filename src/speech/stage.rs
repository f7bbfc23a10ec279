use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{HashStore, write_atomic};
use crate::cancel::CancellationToken;
use crate::error::{Result, SlidecastError};
use crate::layout::WorkspaceLayout;
use crate::narration::{LanguageTrack, NarrationUnit};
use crate::progress::{LanguageStage, ProgressSink};
use super::SpeechSynthesizer;

/// Narration audio of one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideAudio {
    Speech(PathBuf),
    /// The slide has no narration
    Silent,
}

impl SlideAudio {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Speech(path) => Some(path),
            Self::Silent => None,
        }
    }
}

/// Produces per-slide narration audio for one language.
pub struct AudioStage {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    layout: WorkspaceLayout,
    requests: Arc<Semaphore>,
    progress: Arc<dyn ProgressSink>,
}

impl AudioStage {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        layout: WorkspaceLayout,
        requests: Arc<Semaphore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            synthesizer,
            layout,
            requests,
            progress,
        }
    }

    /// Audio for a single slide: reuse `output_path` when `cached_fingerprint` matches,
    /// synthesize it otherwise.
    pub async fn generate(
        &self,
        unit: &NarrationUnit,
        cached_fingerprint: Option<&str>,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<SlideAudio> {
        generate_slide(
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.requests),
            unit.clone(),
            cached_fingerprint.map(str::to_string),
            output_path.to_path_buf(),
            cancel.clone(),
        )
        .await
    }

    /// Audio for every slide of `track`, in slide order.
    ///
    /// Slides are independent: every slide runs to completion even when a sibling
    /// fails, and the fingerprint list is saved before any failure is reported, so
    /// a re-run only regenerates what is still missing.
    pub async fn run(&self, track: &mut LanguageTrack, cancel: &CancellationToken) -> Result<Vec<SlideAudio>> {
        let language = track.language.clone();
        let total = track.len();
        let store = HashStore::at(self.layout.audio_dir(&language));
        track.cached_fingerprints = store.load();

        let mut tasks = JoinSet::new();
        for (index, unit) in track.units.iter().enumerate() {
            let cached = track.is_cached(index).then(|| unit.fingerprint.clone());
            let fut = generate_slide(
                Arc::clone(&self.synthesizer),
                Arc::clone(&self.requests),
                unit.clone(),
                cached,
                self.layout.audio_file(&language, index),
                cancel.clone(),
            );
            tasks.spawn(async move { (index, fut.await) });
        }

        let mut audio: Vec<Option<SlideAudio>> = vec![None; total];
        // A slide that does not finish leaves its previous artifact and fingerprint in place.
        let mut fingerprints: Vec<String> = (0..total)
            .map(|index| {
                HashStore::cached_at(&track.cached_fingerprints, index)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        let mut failures: Vec<(usize, SlidecastError)> = Vec::new();
        let mut done = 0;

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    warn!("[{}] Audio task failed: {}", language, e);
                    failures.push((total, SlidecastError::Speech(format!("Audio task failed: {}", e))));
                    continue;
                }
            };
            match result {
                Ok(slide_audio) => {
                    fingerprints[index] = track.units[index].fingerprint.clone();
                    audio[index] = Some(slide_audio);
                    done += 1;
                    self.progress.slide_finished(&language, LanguageStage::SynthesizingAudio, done, total);
                }
                Err(e) => {
                    warn!("[{}] Audio for slide {} failed: {}", language, index + 1, e);
                    failures.push((index, e));
                }
            }
        }

        if fingerprints != track.cached_fingerprints {
            store.save(&fingerprints)?;
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            let count = failures.len();
            let (index, error) = failures.swap_remove(0);
            return Err(match error {
                SlidecastError::Cancelled(_) => error,
                other if index == total => other,
                other => SlidecastError::Speech(format!(
                    "slide {} ({} slide(s) failed): {}",
                    index + 1,
                    count,
                    other
                )),
            });
        }

        info!("[{}] Audio ready for {} slides", language, total);
        audio
            .into_iter()
            .enumerate()
            .map(|(index, a)| {
                a.ok_or_else(|| SlidecastError::Speech(format!("Missing audio for slide {}", index + 1)))
            })
            .collect()
    }
}

async fn generate_slide(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    requests: Arc<Semaphore>,
    unit: NarrationUnit,
    cached_fingerprint: Option<String>,
    output_path: PathBuf,
    cancel: CancellationToken,
) -> Result<SlideAudio> {
    if unit.is_blank() {
        if output_path.exists() {
            // Narration was removed; drop the stale recording.
            if let Err(e) = tokio::fs::remove_file(&output_path).await {
                warn!("Failed to remove stale audio {}: {}", output_path.display(), e);
            }
        }
        return Ok(SlideAudio::Silent);
    }

    if cached_fingerprint.as_deref() == Some(unit.fingerprint.as_str()) && output_path.is_file() {
        debug!("Reusing cached audio {}", output_path.display());
        return Ok(SlideAudio::Speech(output_path));
    }

    let bytes = cancel
        .run(async {
            let _permit = requests
                .acquire()
                .await
                .map_err(|e| SlidecastError::Speech(format!("Request limiter closed: {}", e)))?;
            synthesizer.synthesize(&unit.text).await
        })
        .await?;

    write_atomic(&output_path, &bytes)?;
    debug!("Wrote {} bytes of audio to {}", bytes.len(), output_path.display());
    Ok(SlideAudio::Speech(output_path))
}
