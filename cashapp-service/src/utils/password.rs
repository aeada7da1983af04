//! Password handling for the user store.
//!
//! Passwords set through the admin screens go through [`Password::parse`],
//! which enforces the length policy. Login attempts wrap the raw input with
//! [`Password::new`] instead, so accounts created under an older policy can
//! still sign in.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum length for any password set through the UI.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// A plaintext password. Redacted in Debug output so it cannot leak into
/// logs through `#[instrument]` or error formatting.
#[derive(Clone)]
pub struct Password(String);

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Password {
    /// Wrap a password without policy checks, for verification against a
    /// stored hash.
    pub fn new(raw: String) -> Self {
        Self(raw)
    }

    /// Accept a new password, enforcing the length policy. The error is a
    /// user-facing message suitable for a flash.
    pub fn parse(raw: String) -> Result<Self, String> {
        if raw.chars().count() < MIN_PASSWORD_CHARS {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Argon2id hash with a fresh random salt, in PHC string format.
    pub fn hash(&self) -> Result<String, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
    }

    /// Constant-time check against a stored hash. A hash that does not
    /// parse counts as a mismatch rather than an error, so a corrupt row
    /// behaves like a wrong password.
    pub fn matches(&self, stored_hash: &str) -> bool {
        PasswordHash::new(stored_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(self.0.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enforces_the_minimum_length() {
        assert!(Password::parse("shortly".to_string()).is_err());
        assert!(Password::parse("l0ng-enough".to_string()).is_ok());

        let exactly_eight = Password::parse("12345678".to_string());
        assert!(exactly_eight.is_ok());
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let password = Password::new("hunter2-hunter2".to_string());
        let rendered = format!("{password:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn hashed_password_matches_itself() {
        let password = Password::new("correct horse battery".to_string());
        let hash = password.hash().expect("hashing failed");

        assert!(hash.starts_with("$argon2"));
        assert!(password.matches(&hash));
    }

    #[test]
    fn wrong_password_does_not_match() {
        let password = Password::new("correct horse battery".to_string());
        let hash = password.hash().expect("hashing failed");

        assert!(!Password::new("wrong horse".to_string()).matches(&hash));
    }

    #[test]
    fn malformed_stored_hash_never_matches() {
        let password = Password::new("anything at all".to_string());
        assert!(!password.matches("not-a-phc-string"));
        assert!(!password.matches(""));
    }

    #[test]
    fn each_hash_gets_its_own_salt() {
        let password = Password::new("same input twice".to_string());
        let first = password.hash().expect("hashing failed");
        let second = password.hash().expect("hashing failed");

        assert_ne!(first, second);
        assert!(password.matches(&first));
        assert!(password.matches(&second));
    }
}
