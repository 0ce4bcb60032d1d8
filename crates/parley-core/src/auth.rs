//! Credential hashing with Argon2id.
//!
//! Stored form: `hex(salt):hex(digest)`. The plaintext password never leaves
//! this module.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use parley_shared::constants::{PASSWORD_HASH_LEN, PASSWORD_SALT_LEN};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, Some(PASSWORD_HASH_LEN))
            .map_err(|e| ServiceError::Internal(format!("Invalid Argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(config.password_memory_kib, config.password_iterations)
    }

    /// Hash `password` under a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt: [u8; PASSWORD_SALT_LEN] = rand::thread_rng().gen();
        let digest = self.digest(password, &salt)?;
        Ok(format!("{}:{}", hex::encode(salt), hex::encode(digest)))
    }

    /// Check `password` against a stored `salt:digest` string.
    ///
    /// A malformed stored value verifies as `false`.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let Some((salt_hex, digest_hex)) = stored.split_once(':') else {
            return Ok(false);
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
            return Ok(false);
        };
        if expected.len() != PASSWORD_HASH_LEN {
            return Ok(false);
        }

        let computed = self.digest(password, &salt)?;
        Ok(constant_time_eq(&computed, &expected))
    }

    fn digest(&self, password: &str, salt: &[u8]) -> Result<[u8; PASSWORD_HASH_LEN]> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut out = [0u8; PASSWORD_HASH_LEN];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut out)
            .map_err(|e| ServiceError::Internal(format!("Password hashing failed: {e}")))?;
        Ok(out)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(64, 1).unwrap()
    }

    #[test]
    fn test_hash_verify() {
        let h = hasher();
        let stored = h.hash("test_password_123").unwrap();

        assert!(h.verify("test_password_123", &stored).unwrap());
        assert!(!h.verify("wrong_password", &stored).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let h = hasher();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn stored_form_does_not_contain_plaintext() {
        let stored = hasher().hash("hunter22").unwrap();
        assert!(!stored.contains("hunter22"));
        let (salt, digest) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), PASSWORD_SALT_LEN * 2);
        assert_eq!(digest.len(), PASSWORD_HASH_LEN * 2);
    }

    #[test]
    fn malformed_stored_value_never_verifies() {
        let h = hasher();
        assert!(!h.verify("x", "").unwrap());
        assert!(!h.verify("x", "nothex:nothex").unwrap());
        assert!(!h.verify("x", "00:00").unwrap());
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(PasswordHasher::new(0, 0).is_err());
    }
}
