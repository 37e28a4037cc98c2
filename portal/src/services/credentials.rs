use std::num::NonZeroU32;

use base64::{engine::general_purpose, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::PortalError;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Substrings the strength policy refuses anywhere in a password,
/// matched case-insensitively.
const DENIED_FRAGMENTS: [&str; 5] = ["password", "123456", "qwerty", "admin", "login"];

/// Hashes and verifies portal passwords. The stored format is
/// `base64(salt || derived_key)` with a random 16-byte salt and a 32-byte
/// PBKDF2-HMAC-SHA256 key, so a credential is a single opaque text column.
pub struct CredentialStore {
    rng: SystemRandom,
    iterations: NonZeroU32,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            iterations: NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Validates the strength policy, then derives and encodes the credential.
    pub fn hash(&self, password: &str) -> Result<String, PortalError> {
        self.validate_strength(password)
            .map_err(PortalError::WeakPassword)?;

        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| PortalError::Dependency("Failed to generate salt".to_string()))?;

        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut key,
        );

        let mut raw = [0u8; SALT_LEN + KEY_LEN];
        raw[..SALT_LEN].copy_from_slice(&salt);
        raw[SALT_LEN..].copy_from_slice(&key);
        Ok(general_purpose::STANDARD.encode(raw))
    }

    /// Re-derives against the stored salt and compares in constant time.
    /// Malformed stored values are treated as a mismatch, never an error.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let decoded = match general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        if decoded.len() != SALT_LEN + KEY_LEN {
            return false;
        }

        let (salt, stored_key) = decoded.split_at(SALT_LEN);
        let mut derived = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            salt,
            password.as_bytes(),
            &mut derived,
        );

        constant_time_eq::constant_time_eq(&derived, stored_key)
    }

    pub fn validate_strength(&self, password: &str) -> Result<(), String> {
        if password.len() < 8 {
            return Err("Password must be at least 8 characters long".to_string());
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            return Err("Password must contain at least one uppercase letter".to_string());
        }

        if !password.chars().any(|c| c.is_lowercase()) {
            return Err("Password must contain at least one lowercase letter".to_string());
        }

        if !password.chars().any(|c| c.is_numeric()) {
            return Err("Password must contain at least one number".to_string());
        }

        if !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err("Password must contain at least one special character".to_string());
        }

        let lowered = password.to_lowercase();
        for fragment in DENIED_FRAGMENTS {
            if lowered.contains(fragment) {
                return Err(format!("Password must not contain '{}'", fragment));
            }
        }

        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
