//! Password hashing using Argon2id.
//!
//! Passwords are secrets rather than personal data: they are hashed, never
//! encrypted, and never leave the service.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::error::{CryptoError, CryptoResult};

/// Hash a plaintext password into a PHC-format string.
pub fn hash_password(password: &str) -> CryptoResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

/// True if the stored value looks like a PHC hash produced by [`hash_password`].
pub fn is_password_hash(stored: &str) -> bool {
    stored.starts_with("$argon2")
}

/// Verify a password against a stored hash.
///
/// A stored value that is not a valid hash (legacy rows) never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!("stored password is not a valid Argon2 hash; rejecting login");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("secret123").unwrap();
        assert!(is_password_hash(&hash));
        assert!(verify_password("secret123", &hash));
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("secret123").unwrap();
        assert!(!verify_password("secret124", &hash));
    }

    #[test]
    fn legacy_plaintext_never_verifies() {
        assert!(!verify_password("secret123", "secret123"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
