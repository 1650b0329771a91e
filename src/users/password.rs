use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// The stored hash is missing or does not parse as a PHC string. This is an
/// invariant violation of the record, distinct from a password mismatch.
#[derive(Debug, thiserror::Error)]
#[error("stored password hash is missing or malformed")]
pub struct CredentialError;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Re-derive and compare. `Ok(false)` on mismatch; an error only when the
/// stored hash itself is unusable.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        CredentialError
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "validpass";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrongpass", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        verify_password("anything", "not-a-valid-hash").unwrap_err();
    }

    #[test]
    fn verify_errors_on_empty_hash() {
        verify_password("anything", "").unwrap_err();
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("samepass").expect("hash a");
        let b = hash_password("samepass").expect("hash b");
        assert_ne!(a, b);
    }
}
