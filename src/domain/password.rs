//! Password value object.
//!
//! Argon2 hashing and verification for account passwords.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::config::MIN_PASSWORD_LENGTH;
use crate::errors::{AppError, AppResult};

/// Hash verified against when the account does not exist, so lookups of
/// unknown emails take as long as real ones.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0MTIzNDU2$3q2+7w1N0oPBOQpC8rz2wKdGeGv0p0b2C0p1f8y1S2g";

/// Password value object that handles hashing and verification.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Hash a new plain-text password.
    ///
    /// # Errors
    /// Returns a validation error if the password is shorter than
    /// `MIN_PASSWORD_LENGTH`.
    pub fn new(plain_text: &str) -> AppResult<Self> {
        if plain_text.chars().count() < MIN_PASSWORD_LENGTH as usize {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain_text.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?
            .to_string();
        Ok(Self { hash })
    }

    /// Wrap a hash loaded from the database.
    pub fn from_hash(hash: String) -> Self {
        Self { hash }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn into_string(self) -> String {
        self.hash
    }

    /// Verify a plain-text password against this hash.
    pub fn verify(&self, plain_text: &str) -> bool {
        PasswordHash::new(&self.hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(plain_text.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Verify against an optional stored hash, spending the same work when
    /// there is no account behind the lookup.
    pub fn verify_stored(stored_hash: Option<&str>, plain_text: &str) -> bool {
        match stored_hash {
            Some(hash) => Password::from_hash(hash.to_string()).verify(plain_text),
            None => {
                let _ = Password::from_hash(DUMMY_HASH.to_string()).verify(plain_text);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = Password::new("SecurePassword123!").unwrap();

        assert!(password.verify("SecurePassword123!"));
        assert!(!password.verify("WrongPassword123"));
    }

    #[test]
    fn test_password_restored_from_hash() {
        let password = Password::new("TestPassword123").unwrap();
        let restored = Password::from_hash(password.as_str().to_string());
        assert!(restored.verify("TestPassword123"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let pass1 = Password::new("SamePassword123").unwrap();
        let pass2 = Password::new("SamePassword123").unwrap();
        assert_ne!(pass1.as_str(), pass2.as_str());
    }

    #[test]
    fn test_password_length_boundary() {
        assert!(Password::new("short").is_err());
        assert!(Password::new("12345678").is_ok());
    }

    #[test]
    fn test_verify_stored_without_account_fails() {
        assert!(!Password::verify_stored(None, "whatever123"));
        let password = Password::new("RealPassword1").unwrap();
        assert!(Password::verify_stored(Some(password.as_str()), "RealPassword1"));
    }
}
