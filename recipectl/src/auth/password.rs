//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC recommendations
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password with the given parameters.
pub fn hash_string_with_params(input: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a string against a hash.
///
/// Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Hash on the blocking pool; argon2 is deliberately slow.
pub async fn hash_password(password: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string_with_params(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Hash a random throwaway password with `params`.
///
/// The result never matches any input a client could send; it only exists to be
/// verified against so that every credential check pays the same argon2 cost.
pub async fn dummy_hash(params: Argon2Params) -> Result<String, Error> {
    hash_password(crate::crypto::generate_token(), params).await
}

/// Check a candidate password against the configured length bounds, returning the
/// message to show the user when it falls outside them.
pub fn check_length(password: &str, config: &PasswordConfig) -> Option<String> {
    let length = password.chars().count();
    if length < config.min_length {
        Some(format!("Ensure this field has at least {} characters.", config.min_length))
    } else if length > config.max_length {
        Some(format!("Ensure this field has no more than {} characters.", config.max_length))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_string_hashing() {
        let input = "test_password_123";
        let hash = hash_string_with_params(input, fast_params()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_string(input, &hash).unwrap());
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let input = "same_password";

        let hash1 = hash_string_with_params(input, fast_params()).unwrap();
        let hash2 = hash_string_with_params(input, fast_params()).unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_string(input, &hash1).unwrap());
        assert!(verify_string(input, &hash2).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_string("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_invalid_params_are_internal_errors() {
        let params = Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(hash_string_with_params("pw", params), Err(Error::Internal { .. })));
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let hash = hash_password("pass1234".to_string(), fast_params()).await.unwrap();
        assert!(verify_password("pass1234".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("pass12345".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_dummy_hash_uses_configured_cost() {
        let hash = dummy_hash(fast_params()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024,t=1,p=1"));
        assert!(!verify_string("", &hash).unwrap());

        assert_ne!(hash, dummy_hash(fast_params()).await.unwrap());
    }

    #[test]
    fn test_check_length() {
        let config = PasswordConfig {
            min_length: 5,
            max_length: 8,
            ..Default::default()
        };

        assert!(check_length("pass", &config).is_some());
        assert!(check_length("pass1", &config).is_none());
        assert!(check_length("pass1234", &config).is_none());
        assert!(check_length("pass12345", &config).is_some());
    }
}
