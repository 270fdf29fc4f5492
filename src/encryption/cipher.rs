//! AES-256-GCM field cipher.
//!
//! Stored format: `enc:v1:<key_id>:<base64(nonce || ciphertext || tag)>`.
//! The associated data is the `table.field` context, so a ciphertext only
//! opens in the column it was written for.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

use super::error::{CryptoError, CryptoResult, DecryptError};
use crate::config::EncryptionConfig;
use super::key::AppKey;

/// Nonce size for AES-256-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

const MARKER: &str = "enc:";
const VERSION: &str = "v1";

/// Which configured key opened a ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Primary,
    Previous,
}

impl KeyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRole::Primary => "primary",
            KeyRole::Previous => "previous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub plaintext: String,
    pub key: KeyRole,
}

struct KeySlot {
    id: String,
    aead: Aes256Gcm,
}

impl KeySlot {
    fn new(key: &AppKey) -> Self {
        Self {
            id: key.key_id(),
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }
}

/// Symmetric authenticated cipher for encryptable attributes.
///
/// Writes always use the primary key. A previous key, when configured, is
/// accepted for reads only so rows written before a rotation stay readable
/// until the backfill re-encrypts them.
pub struct FieldCipher {
    primary: KeySlot,
    previous: Option<KeySlot>,
}

impl FieldCipher {
    pub fn new(key: &AppKey) -> Self {
        Self {
            primary: KeySlot::new(key),
            previous: None,
        }
    }

    pub fn with_previous(mut self, key: &AppKey) -> Self {
        let slot = KeySlot::new(key);
        if slot.id != self.primary.id {
            self.previous = Some(slot);
        }
        self
    }

    /// Primary key from `config.key_var`, plus the optional previous key
    /// from `config.previous_key_var`.
    pub fn from_env(config: &EncryptionConfig) -> CryptoResult<Self> {
        let primary = AppKey::from_env(&config.key_var)?;
        let cipher = Self::new(&primary);
        Ok(match AppKey::from_env_optional(&config.previous_key_var)? {
            Some(previous) => cipher.with_previous(&previous),
            None => cipher,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.primary.id
    }

    pub fn previous_key_id(&self) -> Option<&str> {
        self.previous.as_ref().map(|slot| slot.id.as_str())
    }

    /// True when the value fully parses as ciphertext under a key this
    /// cipher holds. Free text that merely starts with the marker does not.
    pub fn is_own_ciphertext(&self, value: &str) -> bool {
        let Ok((_, _, bytes)) = self.parse(value) else {
            return false;
        };
        bytes.len() >= NONCE_SIZE + TAG_SIZE
    }

    pub fn encrypt(&self, context: &str, plaintext: &str) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = self
            .primary
            .aead
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Encryption {
                context: context.to_string(),
            })?;

        let mut bytes = Vec::with_capacity(NONCE_SIZE + sealed.len());
        bytes.extend_from_slice(&nonce_bytes);
        bytes.extend_from_slice(&sealed);

        Ok(format!(
            "{}{}:{}:{}",
            MARKER,
            VERSION,
            self.primary.id,
            STANDARD.encode(&bytes)
        ))
    }

    pub fn decrypt(&self, context: &str, stored: &str) -> Result<String, DecryptError> {
        self.open(context, stored).map(|opened| opened.plaintext)
    }

    /// Decrypt and report which key was used.
    pub fn open(&self, context: &str, stored: &str) -> Result<Opened, DecryptError> {
        let (slot, role, bytes) = self.parse(stored)?;
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DecryptError::Malformed("payload too short".to_string()));
        }

        let (nonce, sealed) = bytes.split_at(NONCE_SIZE);
        let plain = slot
            .aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| DecryptError::Authentication)?;

        let plaintext = String::from_utf8(plain)
            .map_err(|_| DecryptError::Malformed("plaintext is not utf-8".to_string()))?;

        Ok(Opened { plaintext, key: role })
    }

    /// Split a stored value into the key slot it names and its raw payload.
    fn parse(&self, stored: &str) -> Result<(&KeySlot, KeyRole, Vec<u8>), DecryptError> {
        let body = stored.strip_prefix(MARKER).ok_or(DecryptError::NotCiphertext)?;

        let mut parts = body.splitn(3, ':');
        let version = parts.next().unwrap_or_default();
        if version != VERSION {
            return Err(DecryptError::UnsupportedVersion(version.to_string()));
        }
        let (key_id, encoded) = match (parts.next(), parts.next()) {
            (Some(id), Some(data)) if !id.is_empty() && !data.is_empty() => (id, data),
            _ => return Err(DecryptError::Malformed("missing key id or payload".to_string())),
        };

        let (slot, role) = if key_id == self.primary.id {
            (&self.primary, KeyRole::Primary)
        } else {
            match &self.previous {
                Some(prev) if prev.id == key_id => (prev, KeyRole::Previous),
                _ => return Err(DecryptError::UnknownKey(key_id.to_string())),
            }
        };

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| DecryptError::Malformed(format!("invalid base64: {}", e)))?;
        Ok((slot, role, bytes))
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key_id", &self.primary.id)
            .field("previous_key_id", &self.previous_key_id())
            .finish()
    }
}
