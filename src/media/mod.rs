// Media processing
//
// - Commands: ffmpeg/ffprobe invocations built as plain argument lists
// - Processor: the ffmpeg-backed MediaProcessor used by the video stage

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::{Dimensions, MediaConfig, PipelineConfig};
use crate::error::Result;
use crate::slides::Slide;
use crate::speech::SlideAudio;
use crate::transition::TransitionPlan;

/// Frame settings shared by every segment of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub dimensions: Dimensions,
    pub fps: u32,
    /// On-screen time of an image slide without narration
    pub silent_seconds: f64,
    /// Extra encoder options the processor passes to every encode
    pub video_options: Vec<String>,
}

impl RenderSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            fps: config.fps,
            silent_seconds: config.silent_slide_seconds,
            video_options: config.video_options.clone(),
        }
    }

    /// Stable text form, used in segment cache keys.
    pub fn describe(&self) -> String {
        format!(
            "{}x{}@{}fps silent={:.3} options={}",
            self.dimensions.width,
            self.dimensions.height,
            self.fps,
            self.silent_seconds,
            self.video_options.join(" ")
        )
    }
}

/// Encoder operations the video stage depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Render one slide and its narration into a self-contained segment.
    async fn render_segment(
        &self,
        slide: &Slide,
        audio: &SlideAudio,
        output_path: &Path,
        settings: &RenderSettings,
    ) -> Result<()>;

    /// Join segments in order, blending them as `plan` describes.
    async fn concatenate(
        &self,
        segments: &[PathBuf],
        plan: &TransitionPlan,
        output_path: &Path,
    ) -> Result<()>;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Check that the encoder and the prober can be executed
    async fn check_availability(&self) -> Result<()>;

    /// First line of the encoder's version banner
    async fn version(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessor> {
        Box::new(processor::FfmpegProcessor::new(config))
    }
}
