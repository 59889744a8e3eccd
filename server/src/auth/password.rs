//! Sync secret hashing and verification using Argon2.
//!
//! Secrets are long-lived clinic credentials, so they get the same treatment
//! as passwords: argon2id with a per-secret salt, stored as a PHC string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Hash a raw sync secret.
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash secret: {e}")))
}

/// Verify a raw sync secret against a stored hash.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("invalid secret hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let secret = "clinic-sync-secret-1";
        let hash = hash_secret(secret).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret(secret, &hash).unwrap());
        assert!(!verify_secret("wrong-secret", &hash).unwrap());
    }

    #[test]
    fn different_salts() {
        let secret = "same-secret";
        let hash1 = hash_secret(secret).unwrap();
        let hash2 = hash_secret(secret).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_secret(secret, &hash1).unwrap());
        assert!(verify_secret(secret, &hash2).unwrap());
    }

    #[test]
    fn invalid_hash_format() {
        assert!(verify_secret("secret", "not-a-valid-hash").is_err());
    }
}
