//! Argon2id password hashing with a server-side pepper.

use super::errors::PasswordError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hashes and verifies passwords; the pepper never reaches the database
#[derive(Clone)]
pub struct PasswordHasherWithPepper {
    pepper: String,
}

impl PasswordHasherWithPepper {
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    fn peppered(&self, password: &str) -> String {
        format!("{}{}", password, self.pepper)
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(self.peppered(password).as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?
            .to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::Mismatch)?;
        Argon2::default()
            .verify_password(self.peppered(password).as_bytes(), &parsed)
            .map_err(|_| PasswordError::Mismatch)
    }
}

impl std::fmt::Debug for PasswordHasherWithPepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasherWithPepper")
            .field("pepper", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasherWithPepper::new("pepper-of-sixteen");
        let hash = hasher.hash("Secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Secret123", &hash).is_ok());
        assert_eq!(
            hasher.verify("secret123", &hash),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_pepper_is_required() {
        let hash = PasswordHasherWithPepper::new("pepper-one-aaaaaa")
            .hash("Secret123")
            .unwrap();
        let other = PasswordHasherWithPepper::new("pepper-two-bbbbbb");
        assert!(other.verify("Secret123", &hash).is_err());
    }

    #[test]
    fn test_debug_redacts_pepper() {
        let hasher = PasswordHasherWithPepper::new("very-secret-pepper");
        assert!(!format!("{hasher:?}").contains("very-secret"));
    }
}
