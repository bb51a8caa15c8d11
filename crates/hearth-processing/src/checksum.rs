//! SHA-256 content digests.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compare `data` against an expected hex digest, ignoring case and surrounding whitespace.
pub fn verify(data: &[u8], expected: &str) -> bool {
    digest(data).eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_known_value() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        assert_eq!(digest(&data), digest(&data));
        assert_ne!(digest(&data), digest(&data[1..]));
    }

    #[test]
    fn test_verify() {
        let sum = digest(b"floor plan");
        assert!(verify(b"floor plan", &sum));
        assert!(verify(b"floor plan", &sum.to_uppercase()));
        assert!(!verify(b"floor plan v2", &sum));
    }
}
