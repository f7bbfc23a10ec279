use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, SlidecastError};
use crate::language;
use crate::transition::TransitionSettings;

fn default_silent_slide_seconds() -> f64 {
    3.0
}

fn default_output_name() -> String {
    "presentation".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub transition: TransitionConfig,
    pub translate: TranslateConfig,
    pub speech: SpeechConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Working directory every other relative path is resolved against
    pub root_dir: PathBuf,
    /// Directory holding one image or video clip per slide
    pub slides_dir: PathBuf,
    /// Narration for the input language, slides separated by a `-` line
    pub narration_file: PathBuf,
    /// Per-language translation, audio and segment caches
    pub cache_dir: PathBuf,
    /// Where final videos are written
    pub output_dir: PathBuf,
    /// Final videos are named `<output_name>_<language>.mp4`
    #[serde(default = "default_output_name")]
    pub output_name: String,
    /// Language the narration file is written in
    pub input_language: String,
    /// Languages to produce; the input language is always produced first
    pub output_languages: Vec<String>,
    /// Upper bound on simultaneous translator and synthesizer requests
    pub max_concurrent_requests: usize,
    /// Upper bound on simultaneous ffmpeg processes
    pub max_concurrent_encodes: usize,
    /// Abort the whole run after this many seconds
    pub timeout_secs: Option<u64>,
    /// How long an image slide without narration stays on screen
    #[serde(default = "default_silent_slide_seconds")]
    pub silent_slide_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Transition name (`none`, `fade`, `dissolve`, `wipeleft`, ...)
    pub kind: String,
    /// Overlap between two slides in seconds, at most 5
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// OpenAI compatible API base URL
    pub endpoint: String,
    /// Chat model used for translation
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Maximum retries for failed translations
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// OpenAI compatible API base URL
    pub endpoint: String,
    /// Text-to-speech model
    pub model: String,
    /// Voice name
    pub voice: String,
    /// Audio container requested from the API, also the cached file extension
    pub format: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Maximum retries for failed syntheses
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Additional encoding options for every encode
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub video_options: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineSection {
                root_dir: PathBuf::from("."),
                slides_dir: PathBuf::from("slides"),
                narration_file: PathBuf::from("narration.txt"),
                cache_dir: PathBuf::from(".slidecast/cache"),
                output_dir: PathBuf::from("output"),
                output_name: default_output_name(),
                input_language: "en".to_string(),
                output_languages: vec!["en".to_string()],
                max_concurrent_requests: 8,
                max_concurrent_encodes: 4,
                timeout_secs: None,
                silent_slide_seconds: default_silent_slide_seconds(),
            },
            transition: TransitionConfig {
                kind: "fade".to_string(),
                duration: 0.5,
            },
            translate: TranslateConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                max_retries: 3,
                timeout_secs: 120,
            },
            speech: SpeechConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                format: "mp3".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                max_retries: 3,
                timeout_secs: 120,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                width: 1920,
                height: 1080,
                fps: 30,
                video_options: vec![
                    // "-preset".to_string(), "medium".to_string(),
                    // "-crf".to_string(), "23".to_string(),
                ],
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlidecastError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SlidecastError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SlidecastError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SlidecastError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root_dir: PathBuf,
    pub slides_dir: PathBuf,
    pub narration_file: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub input_language: String,
    /// Deduplicated, input language first
    pub output_languages: Vec<String>,
    pub transition: TransitionSettings,
    pub dimensions: Dimensions,
    pub fps: u32,
    /// Extra encoder options, part of every segment's cache key
    pub video_options: Vec<String>,
    pub max_concurrent_requests: usize,
    pub max_concurrent_encodes: usize,
    pub timeout: Option<Duration>,
    pub silent_slide_seconds: f64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = &config.pipeline;
        // Every derived path is absolute; ffmpeg resolves list entries against the list file.
        let root = std::path::absolute(&section.root_dir)?;

        let input_language = language::normalize(&section.input_language);
        if input_language.is_empty() {
            return Err(SlidecastError::Config("Input language must not be empty".to_string()));
        }

        let mut output_languages = vec![input_language.clone()];
        for lang in &section.output_languages {
            let lang = language::normalize(lang);
            if lang.is_empty() || output_languages.contains(&lang) {
                continue;
            }
            if !language::is_known(&lang) {
                warn!("Unknown language code '{}', passing it to the translator as-is", lang);
            }
            output_languages.push(lang);
        }

        if section.max_concurrent_requests == 0 || section.max_concurrent_encodes == 0 {
            return Err(SlidecastError::Config(
                "Concurrency limits must be at least 1".to_string(),
            ));
        }

        if config.media.width == 0 || config.media.height == 0 || config.media.fps == 0 {
            return Err(SlidecastError::Config(
                "Output width, height and fps must be positive".to_string(),
            ));
        }

        if !section.silent_slide_seconds.is_finite() || section.silent_slide_seconds <= 0.0 {
            return Err(SlidecastError::Config(
                "silent_slide_seconds must be positive".to_string(),
            ));
        }

        let narration_file = root.join(&section.narration_file);
        if !narration_file.is_file() {
            return Err(SlidecastError::FileNotFound(narration_file.display().to_string()));
        }

        Ok(Self {
            root_dir: root.clone(),
            slides_dir: root.join(&section.slides_dir),
            narration_file,
            cache_dir: root.join(&section.cache_dir),
            output_dir: root.join(&section.output_dir),
            output_name: section.output_name.clone(),
            input_language,
            output_languages,
            transition: TransitionSettings::validate(&config.transition.kind, config.transition.duration),
            dimensions: Dimensions {
                width: config.media.width,
                height: config.media.height,
            },
            fps: config.media.fps,
            video_options: config.media.video_options.clone(),
            max_concurrent_requests: section.max_concurrent_requests,
            max_concurrent_encodes: section.max_concurrent_encodes,
            timeout: section.timeout_secs.map(Duration::from_secs),
            silent_slide_seconds: section.silent_slide_seconds,
        })
    }
}

#[cfg(test)]
impl PipelineConfig {
    /// Settings rooted at `root` with transitions disabled and small limits.
    pub(crate) fn for_root(root: &Path) -> Self {
        Self {
            root_dir: root.to_path_buf(),
            slides_dir: root.join("slides"),
            narration_file: root.join("narration.txt"),
            cache_dir: root.join("cache"),
            output_dir: root.join("output"),
            output_name: "deck".to_string(),
            input_language: "en".to_string(),
            output_languages: vec!["en".to_string()],
            transition: TransitionSettings::none(),
            dimensions: Dimensions { width: 640, height: 360 },
            fps: 25,
            video_options: Vec::new(),
            max_concurrent_requests: 4,
            max_concurrent_encodes: 2,
            timeout: None,
            silent_slide_seconds: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionKind;
    use assert_fs::TempDir;

    fn config_in(dir: &Path) -> Config {
        std::fs::write(dir.join("narration.txt"), "Hello\n-\nWorld\n").unwrap();
        let mut config = Config::default();
        config.pipeline.root_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slidecast.toml");
        Config::default().save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.input_language, "en");
        assert_eq!(loaded.transition.kind, "fade");
        assert_eq!(loaded.media.width, 1920);
    }

    #[test]
    fn test_languages_are_deduplicated_with_input_first() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.pipeline.output_languages =
            vec!["fr".into(), "EN".into(), "de".into(), "fr".into(), " ".into()];

        let pipeline = PipelineConfig::from_config(&config).unwrap();
        assert_eq!(pipeline.output_languages, vec!["en", "fr", "de"]);
        assert_eq!(pipeline.narration_file, dir.path().join("narration.txt"));
    }

    #[test]
    fn test_invalid_transition_falls_back_to_none() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.transition.kind = "spin".into();

        let pipeline = PipelineConfig::from_config(&config).unwrap();
        assert_eq!(pipeline.transition.kind, TransitionKind::None);
    }

    #[test]
    fn test_missing_narration_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.pipeline.root_dir = dir.path().to_path_buf();

        let result = PipelineConfig::from_config(&config);
        assert!(matches!(result, Err(SlidecastError::FileNotFound(_))));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let dir = tempfile::tempdir_in(".").unwrap();
        assert!(dir.path().is_relative());
        let mut config = config_in(dir.path());
        config.pipeline.root_dir = dir.path().to_path_buf();

        let pipeline = PipelineConfig::from_config(&config).unwrap();
        assert!(pipeline.root_dir.is_absolute());
        assert!(pipeline.cache_dir.is_absolute());
        assert!(pipeline.output_dir.is_absolute());
        assert!(pipeline.narration_file.is_file());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.pipeline.max_concurrent_encodes = 0;
        assert!(matches!(
            PipelineConfig::from_config(&config),
            Err(SlidecastError::Config(_))
        ));
    }
}
