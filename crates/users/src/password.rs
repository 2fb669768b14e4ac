//! Password hashing.
//!
//! Passwords are stored as Argon2id PHC strings. The unset sentinel
//! ([`PASSWORD_UNSET`]) is not a valid PHC string, so verification against
//! it fails without special casing.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tribune_core::{ApiError, ApiResult};

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| ApiError::store(format!("random salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ApiError::store(format!("salt encoding failed: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::store(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash. Returns `false` for
/// anything that is not a parseable hash, including the unset sentinel.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribune_core::PASSWORD_UNSET;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("S3cret", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("s3cret").unwrap();
        let b = hash_password("s3cret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sentinel_never_verifies() {
        assert!(!verify_password("*", PASSWORD_UNSET));
        assert!(!verify_password("", PASSWORD_UNSET));
    }

}
