use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, SlidecastError};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const CLIP_EXTENSIONS: [&str; 4] = ["mp4", "mov", "mkv", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideKind {
    /// Still image, shown for as long as its narration lasts
    Image,
    /// Video clip, kept at its own length with narration laid over it
    Clip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub index: usize,
    pub path: PathBuf,
    pub kind: SlideKind,
}

impl Slide {
    pub fn from_path<P: AsRef<Path>>(index: usize, path: P) -> Result<Self> {
        let path = path.as_ref();
        let kind = slide_kind(path).ok_or_else(|| {
            SlidecastError::UnsupportedFormat(path.display().to_string())
        })?;
        Ok(Self {
            index,
            path: path.to_path_buf(),
            kind,
        })
    }
}

fn slide_kind(path: &Path) -> Option<SlideKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SlideKind::Image)
    } else if CLIP_EXTENSIONS.contains(&ext.as_str()) {
        Some(SlideKind::Clip)
    } else {
        None
    }
}

/// Where slide visuals come from.
#[async_trait]
pub trait SlideSource: Send + Sync {
    /// Slides in presentation order.
    async fn slides(&self) -> Result<Vec<Slide>>;
}

/// Slides exported into a local directory, ordered by file name.
pub struct DirectorySlideSource {
    dir: PathBuf,
}

impl DirectorySlideSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SlideSource for DirectorySlideSource {
    async fn slides(&self) -> Result<Vec<Slide>> {
        if !self.dir.is_dir() {
            return Err(SlidecastError::FileNotFound(self.dir.display().to_string()));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                let supported = slide_kind(p).is_some();
                if !supported {
                    debug!("Skipping non-slide file {}", p.display());
                }
                supported
            })
            .collect();
        paths.sort();

        let slides = paths
            .iter()
            .enumerate()
            .map(|(index, path)| Slide::from_path(index, path))
            .collect::<Result<Vec<_>>>()?;

        info!("Found {} slides in {}", slides.len(), self.dir.display());
        Ok(slides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[tokio::test]
    async fn test_directory_source_orders_by_name_and_skips_other_files() {
        let dir = TempDir::new().unwrap();
        for name in ["002.png", "001.jpg", "003.MP4", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let slides = DirectorySlideSource::new(dir.path()).slides().await.unwrap();
        let names: Vec<_> = slides
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["001.jpg", "002.png", "003.MP4"]);
        assert_eq!(slides[2].kind, SlideKind::Clip);
        assert_eq!(slides[2].index, 2);
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let result = DirectorySlideSource::new(dir.path().join("slides")).slides().await;
        assert!(matches!(result, Err(SlidecastError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_slide_format() {
        assert!(Slide::from_path(0, "deck.pdf").is_err());
        assert_eq!(Slide::from_path(0, "a.jpeg").unwrap().kind, SlideKind::Image);
    }
}
