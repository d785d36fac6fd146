//! Argon2id password hashing.
//!
//! Hashes are PHC strings; the salt and parameters travel inside them so a
//! hash produced today still verifies after the defaults change.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::RngCore;

use crate::store::UserRecord;

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns an error if the salt cannot be encoded or hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Compare a plaintext password against a PHC hash.
///
/// Unparseable hashes never verify.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Check a supplied password against a stored identity.
#[must_use]
pub fn verify_credential(record: &UserRecord, supplied: &str) -> bool {
    verify_password(&record.password_hash, supplied)
}

/// Run [`verify_password`] off the async runtime.
pub async fn verify_password_blocking(hash: String, password: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .unwrap_or(false)
}

/// Run [`hash_password`] off the async runtime.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task panics.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| anyhow!("password hashing task failed: {e}"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<()> {
        let hash = hash_password("admin123")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "admin123"));
        assert!(!verify_password(&hash, "admin124"));
        Ok(())
    }

    #[test]
    fn salts_differ_per_hash() -> Result<()> {
        let first = hash_password("same")?;
        let second = hash_password("same")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", ""));
    }

    #[tokio::test]
    async fn blocking_wrappers_agree() -> Result<()> {
        let hash = hash_password_blocking("teacher123".to_string()).await?;
        assert!(verify_password_blocking(hash.clone(), "teacher123".to_string()).await);
        assert!(!verify_password_blocking(hash, "nope".to_string()).await);
        Ok(())
    }
}
