use sha2::{Digest, Sha256};

/// Hex length of a lookup hash (SHA-256).
pub const HASH_LEN: usize = 64;

/// Normalization applied before hashing: surrounding whitespace removed, case folded.
pub fn normalize(plaintext: &str) -> String {
    plaintext.trim().to_lowercase()
}

/// Deterministic lookup digest of `lower(trim(plaintext))`.
///
/// Must only ever see the original plaintext, never ciphertext.
pub fn derive_hash(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(plaintext).as_bytes());
    format!("{:x}", hasher.finalize())
}
