use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SlidecastError};
use crate::slides::{Slide, SlideKind};
use crate::speech::SlideAudio;
use crate::transition::TransitionPlan;
use super::{MediaCommand, MediaCommandBuilder, MediaProcessor, RenderSettings, concat_list};

/// Media processor driving ffmpeg and ffprobe subprocesses
pub struct FfmpegProcessor {
    command_builder: MediaCommandBuilder,
    /// Frame rate of the final re-encode when segments are blended
    fps: u32,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path)
            .with_extra_options(config.video_options);

        Self {
            command_builder,
            fps: config.fps,
        }
    }

    /// The encode that turns `slide` and `audio` into a segment.
    pub fn segment_command(
        &self,
        slide: &Slide,
        audio: &SlideAudio,
        output_path: &Path,
        settings: &RenderSettings,
    ) -> MediaCommand {
        let RenderSettings { dimensions, fps, silent_seconds, .. } = *settings;
        let builder = &self.command_builder;
        match (slide.kind, audio) {
            (SlideKind::Image, SlideAudio::Speech(audio_path)) => {
                builder.image_with_audio(slide.path.as_path(), audio_path.as_path(), output_path, dimensions, fps)
            }
            (SlideKind::Image, SlideAudio::Silent) => {
                builder.image_silent(slide.path.as_path(), output_path, dimensions, fps, silent_seconds)
            }
            (SlideKind::Clip, SlideAudio::Speech(audio_path)) => {
                builder.clip_with_audio(slide.path.as_path(), audio_path.as_path(), output_path, dimensions, fps)
            }
            (SlideKind::Clip, SlideAudio::Silent) => {
                builder.clip_silent(slide.path.as_path(), output_path, dimensions, fps)
            }
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn render_segment(
        &self,
        slide: &Slide,
        audio: &SlideAudio,
        output_path: &Path,
        settings: &RenderSettings,
    ) -> Result<()> {
        debug!("Rendering slide {} -> {}", slide.path.display(), output_path.display());
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.segment_command(slide, audio, output_path, settings)
            .execute()
            .await
            .map_err(|e| match e {
                SlidecastError::Media(msg) => {
                    SlidecastError::Media(format!("slide {}: {}", slide.index + 1, msg))
                }
                other => other,
            })
    }

    async fn concatenate(
        &self,
        segments: &[PathBuf],
        plan: &TransitionPlan,
        output_path: &Path,
    ) -> Result<()> {
        if segments.is_empty() {
            return Err(SlidecastError::Media("No segments to concatenate".to_string()));
        }
        let parent = output_path.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        match plan.filter_graph() {
            Some(graph) => {
                info!(
                    "Concatenating {} segments with {} transitions into {}",
                    segments.len(),
                    plan.kind,
                    output_path.display()
                );
                self.command_builder
                    .blend(segments, &graph, output_path.to_path_buf(), self.fps)
                    .execute()
                    .await
            }
            None => {
                info!("Concatenating {} segments into {}", segments.len(), output_path.display());
                let mut list = NamedTempFile::new_in(parent)?;
                list.write_all(concat_list(&absolute_segments(segments)?).as_bytes())?;
                list.flush()?;

                self.command_builder
                    .concatenate(list.path(), output_path)
                    .execute()
                    .await
            }
        }
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let stdout = self.command_builder.probe_duration(path).capture().await?;
        let duration = stdout.trim().parse::<f64>().map_err(|_| {
            SlidecastError::Media(format!(
                "Unexpected duration '{}' for {}",
                stdout.trim(),
                path.display()
            ))
        })?;
        debug!("{} lasts {:.3}s", path.display(), duration);
        Ok(duration)
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder.version_check().execute().await?;
        self.command_builder.probe_version_check().execute().await?;
        info!("Media processor is available");
        Ok(())
    }

    async fn version(&self) -> Result<String> {
        let banner = self.command_builder.version_check().capture().await?;
        Ok(banner.lines().next().unwrap_or("Unknown version").to_string())
    }
}

/// The concat demuxer resolves relative entries against the list file's directory.
fn absolute_segments(segments: &[PathBuf]) -> Result<Vec<PathBuf>> {
    segments
        .iter()
        .map(|segment| std::path::absolute(segment).map_err(SlidecastError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Dimensions};
    use crate::transition::{TransitionSettings, plan};
    use assert_fs::TempDir;

    fn processor() -> FfmpegProcessor {
        FfmpegProcessor::new(Config::default().media)
    }

    fn settings() -> RenderSettings {
        RenderSettings {
            dimensions: Dimensions { width: 640, height: 360 },
            fps: 25,
            silent_seconds: 4.0,
            video_options: Vec::new(),
        }
    }

    fn slide(name: &str) -> Slide {
        Slide::from_path(0, name).unwrap()
    }

    #[test]
    fn test_segment_command_follows_slide_kind_and_audio() {
        let processor = processor();
        let out = Path::new("seg.mp4");
        let speech = SlideAudio::Speech(PathBuf::from("a.mp3"));

        let image = processor.segment_command(&slide("s.png"), &speech, out, &settings());
        assert_eq!(image.description, "Image segment");
        assert!(image.args.contains(&"a.mp3".to_string()));

        let still = processor.segment_command(&slide("s.png"), &SlideAudio::Silent, out, &settings());
        assert!(still.args.contains(&"4.000".to_string()));

        let clip = processor.segment_command(&slide("s.mov"), &speech, out, &settings());
        assert_eq!(clip.description, "Clip segment");

        let muted = processor.segment_command(&slide("s.webm"), &SlideAudio::Silent, out, &settings());
        assert_eq!(muted.description, "Silent clip segment");
    }

    #[test]
    fn test_concat_list_entries_are_absolute() {
        let relative = vec![PathBuf::from("deck/.slidecast/cache/en/segments/segment-001.mp4")];
        let absolute = absolute_segments(&relative).unwrap();
        assert!(absolute[0].is_absolute());
        assert!(absolute[0].ends_with("deck/.slidecast/cache/en/segments/segment-001.mp4"));

        let list = concat_list(&absolute);
        let cwd = std::env::current_dir().unwrap();
        assert!(list.starts_with(&format!("file '{}", cwd.display())));
    }

    #[tokio::test]
    async fn test_concatenate_rejects_empty_input() {
        let dir = TempDir::new().unwrap();
        let result = processor()
            .concatenate(&[], &TransitionPlan::empty(), &dir.path().join("out.mp4"))
            .await;
        assert!(matches!(result, Err(SlidecastError::Media(_))));
    }

    #[test]
    fn test_blend_graph_matches_segment_count() {
        let plan = plan(&[5.0, 4.0, 6.0], &TransitionSettings::validate("fade", 0.5)).unwrap();
        let segments: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("{}.mp4", i))).collect();
        let graph = plan.filter_graph().unwrap();
        let cmd = processor().command_builder.blend(&segments, &graph, PathBuf::from("o.mp4"), 30);
        assert_eq!(cmd.args.iter().filter(|a| *a == "-i").count(), 3);
        assert!(graph.contains("[2:v]"));
    }
}
