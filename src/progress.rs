use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{info, warn};

/// Per-language pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageStage {
    Pending,
    Translating,
    SynthesizingAudio,
    AssemblingVideo,
    Done,
    Failed,
}

impl LanguageStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for LanguageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Translating => "translating",
            Self::SynthesizingAudio => "synthesizing audio",
            Self::AssemblingVideo => "assembling video",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observer notified as languages move through the pipeline.
pub trait ProgressSink: Send + Sync {
    fn stage_changed(&self, language: &str, stage: LanguageStage);

    /// One slide of `stage` finished; `total` is the slide count for the language.
    fn slide_finished(&self, language: &str, stage: LanguageStage, done: usize, total: usize);
}

/// Reports progress through the log only.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn stage_changed(&self, language: &str, stage: LanguageStage) {
        match stage {
            LanguageStage::Failed => warn!("[{}] {}", language, stage),
            _ => info!("[{}] {}", language, stage),
        }
    }

    fn slide_finished(&self, language: &str, stage: LanguageStage, done: usize, total: usize) {
        info!("[{}] {}: {}/{}", language, stage, done, total);
    }
}

/// One terminal bar per language.
pub struct IndicatifProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, language: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(language.to_string())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(0));
                let style = ProgressStyle::with_template("{prefix:>6} [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> ");
                bar.set_style(style);
                bar.set_prefix(language.to_string());
                bar
            })
            .clone()
    }
}

impl ProgressSink for IndicatifProgress {
    fn stage_changed(&self, language: &str, stage: LanguageStage) {
        let bar = self.bar(language);
        bar.set_message(stage.to_string());
        if stage.is_terminal() {
            bar.finish_with_message(stage.to_string());
        } else {
            bar.set_position(0);
        }
    }

    fn slide_finished(&self, language: &str, _stage: LanguageStage, done: usize, total: usize) {
        let bar = self.bar(language);
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    }
}
