//! Password hashing and reset tokens.
//!
//! Hashes are Argon2id PHC strings; reset tokens are random and only their
//! SHA-256 digest is ever stored.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// How long a reset link stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Checks a new password against its confirmation before it is hashed.
pub fn validate_new_password(password: &str, confirm: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreError::validation(format!(
            "A password must have at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirm {
        return Err(CoreError::validation("Passwords are not the same!"));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| CoreError::InternalError(format!("Salt encoding failed: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::InternalError(format!("Password hashing failed: {}", e)))
}

/// `false` for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// A fresh reset token and the digest to store in its place.
pub fn new_reset_token() -> (String, String) {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let digest = digest_reset_token(&token);
    (token, digest)
}

pub fn digest_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("pass1234").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("pass1234", &hash));
        assert!(!verify_password("pass12345", &hash));
        assert!(!verify_password("pass1234", "not-a-phc-string"));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        assert_ne!(hash_password("pass1234").unwrap(), hash_password("pass1234").unwrap());
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("pass1234", "pass1234").is_ok());
        assert!(matches!(validate_new_password("short", "short"), Err(CoreError::ValidationError(_))));
        assert!(matches!(validate_new_password("pass1234", "pass4321"), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_reset_token_digest() {
        let (token, digest) = new_reset_token();
        assert_eq!(token.len(), 64);
        assert_eq!(digest, digest_reset_token(&token));
        assert_ne!(digest, token);
    }
}
