use std::path::Path;
use tracing::info;

use crate::cache::write_atomic;
use crate::error::{Result, SlidecastError};
use crate::hashing::fingerprint;

/// Line that separates two slides in a narration file.
pub const UNIT_SEPARATOR: &str = "-";

/// One slide's narration in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationUnit {
    pub text: String,
    pub fingerprint: String,
}

impl NarrationUnit {
    pub fn new<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let fingerprint = fingerprint(&text);
        Self { text, fingerprint }
    }

    /// A translated unit keeps the fingerprint of the source it was translated from,
    /// so cache validity follows source edits in every language alike.
    pub fn translated<S: Into<String>>(text: S, source: &NarrationUnit) -> Self {
        Self {
            text: text.into(),
            fingerprint: source.fingerprint.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Ordered narration for one language together with the fingerprints of the previous run.
#[derive(Debug, Clone, Default)]
pub struct LanguageTrack {
    pub language: String,
    pub units: Vec<NarrationUnit>,
    pub cached_fingerprints: Vec<String>,
}

impl LanguageTrack {
    pub fn new<S: Into<String>>(language: S, units: Vec<NarrationUnit>) -> Self {
        Self {
            language: language.into(),
            units,
            cached_fingerprints: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.units.iter().map(|u| u.fingerprint.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.units.iter().map(|u| u.text.clone()).collect()
    }

    /// Whether slide `index` carries the same fingerprint as last run.
    pub fn is_cached(&self, index: usize) -> bool {
        match (self.units.get(index), self.cached_fingerprints.get(index)) {
            (Some(unit), Some(cached)) => !cached.is_empty() && unit.fingerprint == *cached,
            _ => false,
        }
    }
}

/// Split narration text into per-slide texts.
///
/// A separator is a line that is exactly `-` (a trailing `\r` is tolerated). The line
/// break in front of a separator belongs to it; everything else is kept as written.
pub fn parse_units(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut units = Vec::new();
    let mut current = String::new();

    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        if bare == UNIT_SEPARATOR {
            units.push(strip_line_break(std::mem::take(&mut current)));
        } else {
            current.push_str(line);
        }
    }
    units.push(strip_line_break(current));
    units
}

/// Inverse of [`parse_units`] for texts that contain no separator line.
pub fn format_units<S: AsRef<str>>(texts: &[S]) -> String {
    let mut content = texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", UNIT_SEPARATOR));
    content.push('\n');
    content
}

fn strip_line_break(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

/// Read the narration file for the input language.
pub fn load_track<P: AsRef<Path>>(path: P, language: &str) -> Result<LanguageTrack> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SlidecastError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| SlidecastError::Config(format!("Failed to read narration {}: {}", path.display(), e)))?;
    let texts = parse_units(&content);
    if texts.is_empty() {
        return Err(SlidecastError::Config(format!(
            "Narration file {} contains no slides",
            path.display()
        )));
    }

    info!("Loaded {} narration units for '{}' from {}", texts.len(), language, path.display());
    Ok(LanguageTrack::new(
        language,
        texts.into_iter().map(NarrationUnit::new).collect(),
    ))
}

/// Read previously written per-slide texts; a missing or unreadable file is a cache miss.
pub fn read_cached_texts<P: AsRef<Path>>(path: P) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| parse_units(&content))
        .unwrap_or_default()
}

pub fn write_texts<P: AsRef<Path>, S: AsRef<str>>(path: P, texts: &[S]) -> Result<()> {
    write_atomic(path.as_ref(), format_units(texts).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_parse_units_splits_on_separator_lines() {
        let content = "Hello and welcome.\n-\nSecond slide\nspans two lines.\n-\nThe end.\n";
        assert_eq!(
            parse_units(content),
            vec!["Hello and welcome.", "Second slide\nspans two lines.", "The end."]
        );
    }

    #[test]
    fn test_parse_units_preserves_trailing_whitespace() {
        let content = "First  \n\n-\n  Second\t\n";
        assert_eq!(parse_units(content), vec!["First  \n", "  Second\t"]);
    }

    #[test]
    fn test_parse_units_ignores_dashes_inside_text() {
        let content = "a - b\n--\n -\n-\nc";
        assert_eq!(parse_units(content), vec!["a - b\n--\n -", "c"]);
    }

    #[test]
    fn test_parse_units_handles_crlf() {
        let content = "one\r\n-\r\ntwo\r\n";
        assert_eq!(parse_units(content), vec!["one", "two"]);
    }

    #[test]
    fn test_parse_units_empty_content() {
        assert!(parse_units("").is_empty());
    }

    #[test]
    fn test_format_then_parse_keeps_texts() {
        let texts = vec!["Intro", "Multi\nline", ""];
        assert_eq!(parse_units(&format_units(&texts)), texts);
    }

    #[test]
    fn test_translated_unit_keeps_source_fingerprint() {
        let source = NarrationUnit::new("Good morning");
        let translated = NarrationUnit::translated("Bonjour", &source);
        assert_eq!(translated.fingerprint, source.fingerprint);
        assert_ne!(translated.fingerprint, fingerprint("Bonjour"));
    }

    #[test]
    fn test_is_cached_tolerates_length_mismatch() {
        let mut track = LanguageTrack::new(
            "en",
            vec![NarrationUnit::new("a"), NarrationUnit::new("b")],
        );
        track.cached_fingerprints = vec![fingerprint("a")];
        assert!(track.is_cached(0));
        assert!(!track.is_cached(1));
        assert!(!track.is_cached(5));
    }

    #[test]
    fn test_load_track_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_track(dir.path().join("missing.txt"), "en");
        assert!(matches!(missing, Err(SlidecastError::FileNotFound(_))));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(load_track(&empty, "en"), Err(SlidecastError::Config(_))));
    }

    #[test]
    fn test_write_and_read_cached_texts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fr").join("narration.txt");
        write_texts(&path, &["Bonjour", "Au revoir"]).unwrap();
        assert_eq!(read_cached_texts(&path), vec!["Bonjour", "Au revoir"]);
        assert!(read_cached_texts(dir.path().join("nope.txt")).is_empty());
    }
}
