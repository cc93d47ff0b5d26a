//! Password hashing
//!
//! Thin wrapper over argon2. The hash format is the PHC string produced by
//! the crate; verification is constant-time inside the verifier.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use pm_core::PmError;

/// Hash a plaintext password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PmError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PmError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a plaintext password against a stored hash.
///
/// Any failure (malformed hash included) verifies as false; callers treat
/// that the same as a wrong password.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
