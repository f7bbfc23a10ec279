use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, SlidecastError};
use crate::hashing::is_fingerprint;

/// File name of the fingerprint list inside a cached artifact directory.
pub const FINGERPRINTS_FILE: &str = "fingerprints.txt";

/// Fingerprints persisted next to the artifacts they validate.
///
/// Line `i` of the file belongs to slide `i`. An empty line means that slide has
/// no valid cached artifact.
#[derive(Debug, Clone)]
pub struct HashStore {
    dir: PathBuf,
}

impl HashStore {
    pub fn at<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FINGERPRINTS_FILE)
    }

    /// Load the persisted fingerprints. Missing or malformed data is a cache miss.
    pub fn load(&self) -> Vec<String> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No fingerprint file at {}", path.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to read fingerprints from {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        let mut fingerprints = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() && !is_fingerprint(line) {
                warn!(
                    "Malformed fingerprint on line {} of {}, ignoring cache",
                    line_no + 1,
                    path.display()
                );
                return Vec::new();
            }
            fingerprints.push(line.to_string());
        }

        debug!("Loaded {} fingerprints from {}", fingerprints.len(), path.display());
        fingerprints
    }

    /// Replace the persisted fingerprints with `fingerprints`.
    pub fn save(&self, fingerprints: &[String]) -> Result<()> {
        let content: String = fingerprints.iter().map(|fp| format!("{}\n", fp)).collect();
        write_atomic(&self.path(), content.as_bytes())
            .map_err(|e| SlidecastError::Cache(format!("Failed to save fingerprints: {}", e)))?;
        debug!("Saved {} fingerprints to {}", fingerprints.len(), self.path().display());
        Ok(())
    }

    /// Fingerprint cached for `index`, if any.
    pub fn cached_at(fingerprints: &[String], index: usize) -> Option<&str> {
        fingerprints
            .get(index)
            .map(String::as_str)
            .filter(|fp| !fp.is_empty())
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory, so
/// readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| SlidecastError::Cache(format!("No parent directory for {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| SlidecastError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;
    use assert_fs::TempDir;

    #[test]
    fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = HashStore::at(dir.path().join("audio"));
        let fingerprints: Vec<String> = ["one", "two", "three", "four"]
            .iter()
            .map(|t| fingerprint(t))
            .collect();

        store.save(&fingerprints).unwrap();
        assert_eq!(store.load(), fingerprints);
    }

    #[test]
    fn test_empty_entries_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = HashStore::at(dir.path());
        let fingerprints = vec![fingerprint("a"), String::new(), fingerprint("c")];

        store.save(&fingerprints).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, fingerprints);
        assert_eq!(HashStore::cached_at(&loaded, 1), None);
        assert_eq!(HashStore::cached_at(&loaded, 7), None);
    }

    #[test]
    fn test_missing_file_is_cache_miss() {
        let dir = TempDir::new().unwrap();
        assert!(HashStore::at(dir.path().join("nothing")).load().is_empty());
    }

    #[test]
    fn test_malformed_file_is_cache_miss() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(FINGERPRINTS_FILE),
            format!("{}\nnot-a-hash\n", fingerprint("x")),
        )
        .unwrap();
        assert!(HashStore::at(dir.path()).load().is_empty());
    }

    #[test]
    fn test_save_fails_when_directory_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();

        let result = HashStore::at(&blocker).save(&[fingerprint("x")]);
        assert!(matches!(result, Err(SlidecastError::Cache(_))));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
