//! Stable string hashing used for seeds and synthetic identifiers.

use sha2::{Digest, Sha256};

/// First eight bytes of the SHA-256 digest, big-endian.
pub fn stable_hash(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(buf)
}

/// Lowercase hex of the SHA-256 digest, truncated to `len` characters.
pub fn hex_digest(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("JoinContestButtonClick"), stable_hash("JoinContestButtonClick"));
        assert_ne!(stable_hash("Android"), stable_hash("iOS"));
    }

    #[test]
    fn test_hex_digest_length() {
        let hex = hex_digest("NullPointerException", 16);
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
