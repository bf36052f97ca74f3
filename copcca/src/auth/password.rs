//! Argon2id password hashing and reset tokens.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::config::PasswordConfig;
use crate::errors::Error;

fn argon2_for(config: &PasswordConfig) -> Result<Argon2<'static>, Error> {
    let params = Params::new(
        config.argon2_memory_kib,
        config.argon2_iterations,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| Error::Internal {
        operation: format!("create argon2 params: {e}"),
    })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with the configured Argon2id cost. CPU heavy: call from `spawn_blocking`.
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2_for(config)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Internal {
            operation: format!("hash password: {e}"),
        })?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. The cost parameters come from the hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse password hash: {e}"),
    })?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// 256 random bits, base64url without padding.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordConfig {
        PasswordConfig {
            argon2_memory_kib: 128,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Kilimanjaro#2024", &cheap()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Kilimanjaro#2024", &hash).unwrap());
        assert!(!verify_password("kilimanjaro#2024", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-input", &cheap()).unwrap();
        let b = hash_password("same-input", &cheap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_reset_tokens() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_reset_token());
    }

    #[test]
    fn test_invalid_cost_is_rejected() {
        let config = PasswordConfig {
            argon2_memory_kib: 1,
            ..Default::default()
        };
        assert!(hash_password("x", &config).is_err());
    }
}
