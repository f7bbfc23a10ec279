use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::HashStore;
use crate::cancel::CancellationToken;
use crate::error::{Result, SlidecastError};
use crate::hashing::{fingerprint, fingerprint_bytes};
use crate::layout::WorkspaceLayout;
use crate::media::{MediaProcessor, RenderSettings};
use crate::progress::{LanguageStage, ProgressSink};
use crate::slides::Slide;
use crate::speech::SlideAudio;
use crate::transition::{self, TransitionPlan, TransitionSettings};

/// Turns slides and their narration into the final video of one language.
pub struct VideoAssemblyStage {
    media: Arc<dyn MediaProcessor>,
    layout: WorkspaceLayout,
    encodes: Arc<Semaphore>,
    progress: Arc<dyn ProgressSink>,
    settings: RenderSettings,
    transition: TransitionSettings,
}

impl VideoAssemblyStage {
    pub fn new(
        media: Arc<dyn MediaProcessor>,
        layout: WorkspaceLayout,
        encodes: Arc<Semaphore>,
        progress: Arc<dyn ProgressSink>,
        settings: RenderSettings,
        transition: TransitionSettings,
    ) -> Self {
        Self {
            media,
            layout,
            encodes,
            progress,
            settings,
            transition,
        }
    }

    /// Render every segment, then join them into `<output_dir>/<name>_<language>.mp4`.
    pub async fn assemble(
        &self,
        language: &str,
        slides: &[Slide],
        audio: &[SlideAudio],
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if slides.len() != audio.len() {
            return Err(SlidecastError::Media(format!(
                "{} slides but {} audio tracks",
                slides.len(),
                audio.len()
            )));
        }
        if slides.is_empty() {
            return Err(SlidecastError::Media("Nothing to assemble".to_string()));
        }

        let durations = self.render_segments(language, slides, audio, cancel).await?;
        let segments: Vec<PathBuf> = (0..slides.len())
            .map(|i| self.layout.segment_file(language, i))
            .collect();

        let plan = match transition::plan(&durations, &self.transition) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("[{}] {}; joining segments without transitions", language, e);
                TransitionPlan::empty()
            }
        };

        let output = self.layout.output_file(language);
        cancel
            .run(async {
                let _permit = self
                    .encodes
                    .acquire()
                    .await
                    .map_err(|e| SlidecastError::Media(format!("Encode limiter closed: {}", e)))?;
                self.media.concatenate(&segments, &plan, &output).await
            })
            .await?;

        info!(
            "[{}] Wrote {} ({:.1}s)",
            language,
            output.display(),
            plan.total_duration(&durations)
        );
        Ok(output)
    }

    /// Segment durations in slide order.
    ///
    /// A segment is reused while its key, kept in the segment directory's
    /// fingerprint list, matches the current slide, audio and render settings.
    async fn render_segments(
        &self,
        language: &str,
        slides: &[Slide],
        audio: &[SlideAudio],
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>> {
        let total = slides.len();
        let store = HashStore::at(self.layout.segment_dir(language));
        let previous = store.load();
        let mut tasks = JoinSet::new();

        for (index, (slide, slide_audio)) in slides.iter().zip(audio).enumerate() {
            let media = Arc::clone(&self.media);
            let encodes = Arc::clone(&self.encodes);
            let cancel = cancel.clone();
            let slide = slide.clone();
            let slide_audio = slide_audio.clone();
            let settings = self.settings.clone();
            let segment = self.layout.segment_file(language, index);
            let cached = HashStore::cached_at(&previous, index).map(str::to_string);

            tasks.spawn(async move {
                let result = cancel
                    .run(async {
                        let key = segment_key(&slide, &slide_audio, &settings)?;
                        if cached.as_deref() == Some(key.as_str()) && segment.is_file() {
                            debug!("Reusing segment {}", segment.display());
                        } else {
                            let _permit = encodes.acquire().await.map_err(|e| {
                                SlidecastError::Media(format!("Encode limiter closed: {}", e))
                            })?;
                            media.render_segment(&slide, &slide_audio, &segment, &settings).await?;
                        }
                        let duration = media.probe_duration(&segment).await?;
                        Ok((key, duration))
                    })
                    .await;
                (index, result)
            });
        }

        let mut durations = vec![0.0; total];
        // Unfinished segments may be half written, so only finished ones keep a key.
        let mut keys = vec![String::new(); total];
        let mut failure = None;
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(joined) => joined,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    failure.get_or_insert(SlidecastError::Media(format!("Render task failed: {}", e)));
                    tasks.abort_all();
                    continue;
                }
            };
            match result {
                Ok((key, duration)) => {
                    keys[index] = key;
                    durations[index] = duration;
                    done += 1;
                    self.progress.slide_finished(language, LanguageStage::AssemblingVideo, done, total);
                }
                Err(e) => {
                    warn!("[{}] Segment for slide {} failed: {}", language, index + 1, e);
                    failure.get_or_insert(e);
                    tasks.abort_all();
                }
            }
        }

        if keys != previous {
            store.save(&keys)?;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(durations),
        }
    }
}

/// Cache key of one segment: the slide file's identity, the audio content and
/// the render settings.
fn segment_key(slide: &Slide, audio: &SlideAudio, settings: &RenderSettings) -> Result<String> {
    let metadata = std::fs::metadata(&slide.path)?;
    let modified = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let audio_print = match audio.path() {
        Some(path) => fingerprint_bytes(&std::fs::read(path)?),
        None => "silent".to_string(),
    };

    Ok(fingerprint(&format!(
        "{}\n{}\n{}\n{}\n{}",
        slide.path.display(),
        metadata.len(),
        modified,
        audio_print,
        settings.describe()
    )))
}
