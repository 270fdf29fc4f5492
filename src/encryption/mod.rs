//! Field-level encryption.
//!
//! - [`FieldCipher`]: authenticated symmetric encryption of attribute values
//! - [`derive_hash`]: deterministic lookup digests for equality search
//! - [`AttributeCodec`]: applies both to whole rows on write and read
//! - password hashing for secrets that are verified, never decrypted

pub mod attributes;
pub mod cipher;
pub mod error;
pub mod hash;
pub mod key;
pub mod password;

pub use attributes::AttributeCodec;
pub use cipher::{FieldCipher, KeyRole, Opened};
pub use error::{CryptoError, CryptoResult, DecryptError};
pub use hash::{derive_hash, normalize, HASH_LEN};
pub use key::{AppKey, KEY_SIZE};
pub use password::{hash_password, is_password_hash, verify_password};
