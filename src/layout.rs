use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;

/// Every path a run reads or writes, derived once from the validated configuration.
///
/// Cache directories are partitioned per language, and artifact names per slide index,
/// so concurrent tasks never write the same file.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    cache_dir: PathBuf,
    output_dir: PathBuf,
    output_name: String,
    audio_extension: String,
}

impl WorkspaceLayout {
    pub fn new(config: &PipelineConfig, audio_extension: &str) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            output_dir: config.output_dir.clone(),
            output_name: config.output_name.clone(),
            audio_extension: audio_extension.to_string(),
        }
    }

    pub fn language_dir(&self, language: &str) -> PathBuf {
        self.cache_dir.join(language)
    }

    /// Translated narration and its fingerprints.
    pub fn text_dir(&self, language: &str) -> PathBuf {
        self.language_dir(language).join("text")
    }

    pub fn translated_narration(&self, language: &str) -> PathBuf {
        self.text_dir(language).join("narration.txt")
    }

    /// Synthesized audio and its fingerprints.
    pub fn audio_dir(&self, language: &str) -> PathBuf {
        self.language_dir(language).join("audio")
    }

    pub fn audio_file(&self, language: &str, index: usize) -> PathBuf {
        self.audio_dir(language)
            .join(format!("slide-{:03}.{}", index + 1, self.audio_extension))
    }

    pub fn segment_dir(&self, language: &str) -> PathBuf {
        self.language_dir(language).join("segments")
    }

    pub fn segment_file(&self, language: &str, index: usize) -> PathBuf {
        self.segment_dir(language).join(format!("segment-{:03}.mp4", index + 1))
    }

    pub fn output_file(&self, language: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.mp4", self.output_name, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_partitioned_per_language_and_slide() {
        let layout = WorkspaceLayout::new(&PipelineConfig::for_root(Path::new("/work")), "mp3");
        assert_eq!(
            layout.audio_file("fr", 0),
            PathBuf::from("/work/cache/fr/audio/slide-001.mp3")
        );
        assert_ne!(layout.audio_file("fr", 1), layout.audio_file("de", 1));
        assert_eq!(
            layout.translated_narration("de"),
            PathBuf::from("/work/cache/de/text/narration.txt")
        );
        assert_eq!(layout.output_file("ja"), PathBuf::from("/work/output/deck_ja.mp4"));
    }
}
