use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::{Result, SlidecastError};
use crate::layout::WorkspaceLayout;
use crate::media::{MediaProcessor, RenderSettings};
use crate::narration::{LanguageTrack, load_track};
use crate::progress::{LanguageStage, ProgressSink};
use crate::slides::{Slide, SlideSource};
use crate::speech::{AudioStage, SpeechSynthesizer};
use crate::translate::{TranslationStage, Translator};
use crate::video::VideoAssemblyStage;

/// How one language's run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LanguageOutcome {
    Completed { output_path: PathBuf },
    Failed { stage: LanguageStage, error: String },
}

impl LanguageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Outcome of every requested language, keyed by language code.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub outcomes: BTreeMap<String, LanguageOutcome>,
}

impl PipelineReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(LanguageOutcome::is_success)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&String, &LanguageOutcome)> {
        self.outcomes.iter().filter(|(_, outcome)| !outcome.is_success())
    }
}

/// External collaborators of a run.
pub struct Services {
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// File extension of the synthesizer's audio, e.g. `mp3`
    pub audio_format: String,
    pub media: Arc<dyn MediaProcessor>,
    pub slides: Arc<dyn SlideSource>,
    pub progress: Arc<dyn ProgressSink>,
}

struct LanguageStages {
    translation: TranslationStage,
    audio: AudioStage,
    video: VideoAssemblyStage,
    progress: Arc<dyn ProgressSink>,
}

/// Drives every configured language from narration text to final video.
pub struct Pipeline {
    config: PipelineConfig,
    slides: Arc<dyn SlideSource>,
    stages: Arc<LanguageStages>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, services: Services) -> Self {
        let layout = WorkspaceLayout::new(&config, &services.audio_format);
        let requests = Arc::new(Semaphore::new(config.max_concurrent_requests));
        let encodes = Arc::new(Semaphore::new(config.max_concurrent_encodes));

        let stages = LanguageStages {
            translation: TranslationStage::new(
                services.translator,
                layout.clone(),
                Arc::clone(&requests),
                Arc::clone(&services.progress),
            ),
            audio: AudioStage::new(
                services.synthesizer,
                layout.clone(),
                requests,
                Arc::clone(&services.progress),
            ),
            video: VideoAssemblyStage::new(
                services.media,
                layout,
                encodes,
                Arc::clone(&services.progress),
                RenderSettings::from_config(&config),
                config.transition.clone(),
            ),
            progress: services.progress,
        };

        Self {
            config,
            slides: services.slides,
            stages: Arc::new(stages),
        }
    }

    /// Run every language concurrently.
    ///
    /// Only configuration problems fail the call itself; a language that fails
    /// is reported in the returned map and never stops the others.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PipelineReport> {
        cancel.checkpoint()?;
        let base = load_track(&self.config.narration_file, &self.config.input_language)?;
        let slides = self.slides.slides().await?;
        if slides.len() != base.len() {
            return Err(SlidecastError::Config(format!(
                "{} slides but {} narration units in {}",
                slides.len(),
                base.len(),
                self.config.narration_file.display()
            )));
        }

        info!(
            "Producing {} language(s) from {} slides: {}",
            self.config.output_languages.len(),
            slides.len(),
            self.config.output_languages.join(", ")
        );

        let base = Arc::new(base);
        let slides = Arc::new(slides);
        let mut tasks = JoinSet::new();
        for language in &self.config.output_languages {
            self.stages.progress.stage_changed(language, LanguageStage::Pending);
            let stages = Arc::clone(&self.stages);
            let base = Arc::clone(&base);
            let slides = Arc::clone(&slides);
            let cancel = cancel.clone();
            let language = language.clone();
            tasks.spawn(async move {
                let outcome = stages.process(&language, &base, &slides, &cancel).await;
                (language, outcome)
            });
        }

        let mut report = PipelineReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((language, outcome)) => {
                    report.outcomes.insert(language, outcome);
                }
                Err(e) => error!("Language task failed: {}", e),
            }
        }

        for language in &self.config.output_languages {
            report.outcomes.entry(language.clone()).or_insert_with(|| LanguageOutcome::Failed {
                stage: LanguageStage::Pending,
                error: "task terminated unexpectedly".to_string(),
            });
        }

        Ok(report)
    }
}

impl LanguageStages {
    async fn process(
        &self,
        language: &str,
        base: &LanguageTrack,
        slides: &[Slide],
        cancel: &CancellationToken,
    ) -> LanguageOutcome {
        let mut stage = LanguageStage::Translating;
        match self.advance(language, base, slides, cancel, &mut stage).await {
            Ok(output_path) => {
                self.progress.stage_changed(language, LanguageStage::Done);
                LanguageOutcome::Completed { output_path }
            }
            Err(e) => {
                warn!("[{}] Failed while {}: {}", language, stage, e);
                self.progress.stage_changed(language, LanguageStage::Failed);
                LanguageOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        }
    }

    /// `stage` is left at the step that was running when an error is returned.
    async fn advance(
        &self,
        language: &str,
        base: &LanguageTrack,
        slides: &[Slide],
        cancel: &CancellationToken,
        stage: &mut LanguageStage,
    ) -> Result<PathBuf> {
        self.progress.stage_changed(language, *stage);
        let mut track = self.translation.translate(base, language, cancel).await?;

        *stage = LanguageStage::SynthesizingAudio;
        self.progress.stage_changed(language, *stage);
        let audio = self.audio.run(&mut track, cancel).await?;

        *stage = LanguageStage::AssemblingVideo;
        self.progress.stage_changed(language, *stage);
        self.video.assemble(language, slides, &audio, cancel).await
    }
}
