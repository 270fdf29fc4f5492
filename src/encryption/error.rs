use thiserror::Error;

/// Errors raised by the encryption layer on the write path and at startup.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The application key variable is not set. Fatal at startup.
    #[error("encryption key missing: environment variable {0} is not set")]
    MissingKey(String),

    /// The application key could not be decoded or has the wrong length.
    #[error("encryption key invalid: {0}")]
    InvalidKey(String),

    #[error("encryption failed for {context}")]
    Encryption { context: String },

    /// Refuses to encrypt (or hash) a value that is already ciphertext.
    #[error("field '{field}' already holds an encrypted value")]
    AlreadyEncrypted { field: String },

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Why a stored value could not be decrypted. The read path recovers from
/// every variant by passing the stored value through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// No ciphertext marker: a value written before encryption was enabled.
    #[error("value is not in ciphertext format")]
    NotCiphertext,

    #[error("unsupported ciphertext version '{0}'")]
    UnsupportedVersion(String),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Written under a key this process does not hold (rotation without re-encryption).
    #[error("ciphertext was written with unknown key id {0}")]
    UnknownKey(String),

    /// Right key, failed tag: tampered or truncated data.
    #[error("ciphertext failed authentication")]
    Authentication,
}

impl DecryptError {
    /// Short tag used in fallback log events.
    pub fn reason(&self) -> &'static str {
        match self {
            DecryptError::NotCiphertext => "legacy_plaintext",
            DecryptError::UnknownKey(_) => "unknown_key",
            DecryptError::UnsupportedVersion(_) => "unsupported_version",
            DecryptError::Malformed(_) | DecryptError::Authentication => "corrupted",
        }
    }
}
