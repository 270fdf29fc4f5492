//! Application key loading.
//!
//! The key is read once at startup and handed to [`FieldCipher`](super::FieldCipher)
//! explicitly. Accepted forms are `base64:<standard base64>` and bare standard
//! base64, both decoding to exactly 32 bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, CryptoResult};

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

const KEY_PREFIX: &str = "base64:";
const KEY_ID_DOMAIN: &[u8] = b"lexdesk-key-id";

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppKey {
    bytes: [u8; KEY_SIZE],
}

impl AppKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse a key from its configured string form.
    pub fn parse(encoded: &str) -> CryptoResult<Self> {
        let trimmed = encoded.trim();
        let body = trimmed.strip_prefix(KEY_PREFIX).unwrap_or(trimmed);
        if body.is_empty() {
            return Err(CryptoError::InvalidKey("key is empty".to_string()));
        }

        let mut decoded = STANDARD
            .decode(body)
            .map_err(|e| CryptoError::InvalidKey(format!("not valid base64: {}", e)))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE, len
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Read the key from the named environment variable.
    pub fn from_env(var: &str) -> CryptoResult<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Err(CryptoError::MissingKey(var.to_string())),
        }
    }

    /// Read an optional key (e.g. the previous key during rotation).
    /// Unset is fine; set-but-invalid is still an error.
    pub fn from_env_optional(var: &str) -> CryptoResult<Option<Self>> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Encoded form suitable for `APP_KEY`.
    pub fn to_config_string(&self) -> String {
        format!("{}{}", KEY_PREFIX, STANDARD.encode(self.bytes))
    }

    /// Non-secret identifier embedded in every ciphertext written with this key.
    pub fn key_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(KEY_ID_DOMAIN);
        hasher.update(self.bytes);
        let digest = format!("{:x}", hasher.finalize());
        digest[..8].to_string()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppKey")
            .field("id", &self.key_id())
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let key = AppKey::generate();
        let encoded = key.to_config_string();
        let bare = encoded.trim_start_matches(KEY_PREFIX).to_string();

        assert_eq!(AppKey::parse(&encoded).unwrap().key_id(), key.key_id());
        assert_eq!(AppKey::parse(&bare).unwrap().key_id(), key.key_id());
    }

    #[test]
    fn rejects_wrong_length() {
        let short = format!("base64:{}", STANDARD.encode([7u8; 16]));
        match AppKey::parse(&short) {
            Err(CryptoError::InvalidKey(msg)) => assert!(msg.contains("expected 32 bytes")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(matches!(AppKey::parse("base64:!!!"), Err(CryptoError::InvalidKey(_))));
        assert!(matches!(AppKey::parse("base64:"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn missing_env_is_missing_key() {
        let var = "LEXDESK_TEST_KEY_THAT_IS_NEVER_SET";
        assert!(matches!(AppKey::from_env(var), Err(CryptoError::MissingKey(v)) if v == var));
        assert!(AppKey::from_env_optional(var).unwrap().is_none());
    }

    #[test]
    fn debug_never_prints_key_material() {
        let key = AppKey::from_bytes([42u8; KEY_SIZE]);
        let printed = format!("{:?}", key);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(&STANDARD.encode([42u8; KEY_SIZE])));
    }

    #[test]
    fn key_ids_differ_between_keys() {
        let a = AppKey::from_bytes([1u8; KEY_SIZE]);
        let b = AppKey::from_bytes([2u8; KEY_SIZE]);
        assert_eq!(a.key_id().len(), 8);
        assert_ne!(a.key_id(), b.key_id());
    }
}
