//! Password hashing
//!
//! Passwords are stored as Argon2id PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`). Unusable passwords
//! start with `!` and never verify.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MEMORY_KIB: u32 = Params::DEFAULT_M_COST;
pub const DEFAULT_ITERATIONS: u32 = Params::DEFAULT_T_COST;
pub const DEFAULT_PARALLELISM: u32 = Params::DEFAULT_P_COST;

const UNUSABLE_PREFIX: char = '!';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Argon2id hasher for new passwords.
///
/// The cost parameters only affect hashes made from now on; existing hashes
/// carry their own and still verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash with a fresh random salt
    pub fn make_password(&self, raw: &str) -> Result<String, PasswordError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        let hash = self
            .argon2()?
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }
}

/// Verify `raw` against an encoded hash; malformed and unusable hashes
/// never match.
pub fn check_password(raw: &str, encoded: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(encoded) else {
        return false;
    };
    Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok()
}

/// A value that marks the account as having no password
pub fn make_unusable_password() -> String {
    format!("{}{}", UNUSABLE_PREFIX, Uuid::new_v4().simple())
}

pub fn is_password_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordHasher {
        PasswordHasher::new(Params::MIN_M_COST, 1, 1)
    }

    #[test]
    fn test_hash_and_check() {
        let encoded = cheap().make_password("hunter2").unwrap();

        assert!(encoded.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert!(check_password("hunter2", &encoded));
        assert!(!check_password("hunter3", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap();
        assert_ne!(
            hasher.make_password("same").unwrap(),
            hasher.make_password("same").unwrap()
        );
    }

    #[test]
    fn test_hash_carries_its_own_cost() {
        let encoded = PasswordHasher::new(16, 2, 1).make_password("pw").unwrap();
        assert!(encoded.contains("m=16,t=2,p=1"));
        assert!(check_password("pw", &encoded));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let err = PasswordHasher::new(1, 1, 1).make_password("pw").unwrap_err();
        assert!(matches!(err, PasswordError::InvalidParams(_)));
    }

    #[test]
    fn test_malformed_hashes_never_match() {
        assert!(!check_password("x", ""));
        assert!(!check_password("x", "md5$1$salt$abc"));
        assert!(!check_password("x", "$argon2id$v=19$m=8,t=1,p=1$bm90LWEtaGFzaA"));
        assert!(!check_password("x", &make_unusable_password()));
    }

    #[test]
    fn test_unusable_password() {
        let unusable = make_unusable_password();
        assert!(!is_password_usable(&unusable));
        assert!(is_password_usable(&cheap().make_password("pw").unwrap()));
    }
}
