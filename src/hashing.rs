use sha2::{Digest, Sha256};

/// Length of a hex encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Content fingerprint of a narration text: lowercase hex SHA-256 of its UTF-8 bytes.
pub fn fingerprint(text: &str) -> String {
    fingerprint_bytes(text.as_bytes())
}

/// Fingerprint of arbitrary bytes, such as a synthesized audio file.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Whether `value` looks like something `fingerprint` could have produced.
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let text = "Welcome to the quarterly review.";
        assert_eq!(fingerprint(text), fingerprint(text));
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_differs_for_different_text() {
        assert_ne!(fingerprint("slide one"), fingerprint("slide one "));
        assert_ne!(fingerprint("Hello"), fingerprint("hello"));
    }

    #[test]
    fn test_text_and_bytes_agree() {
        assert_eq!(fingerprint("slide"), fingerprint_bytes(b"slide"));
    }

    #[test]
    fn test_is_fingerprint() {
        assert!(is_fingerprint(&fingerprint("abc")));
        assert!(!is_fingerprint("abc"));
        assert!(!is_fingerprint(&fingerprint("abc").to_uppercase()));
    }
}
