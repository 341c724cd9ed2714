//! Salted password digests.
//!
//! Stored form: `{salt}${hex(sha256(salt || password))}`. The salt is a
//! fresh v4 UUID per account. Key stretching is intentionally out of scope
//! here; swap in a KDF behind these two functions if the deployment needs
//! one.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Digest a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

/// Check a password against a stored `salt$digest` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let stored = hash_password("hunter2!");
        assert!(verify_password("hunter2!", &stored));
        assert!(!verify_password("hunter2", &stored));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a));
        assert!(verify_password("same-password", &b));
    }

    #[test]
    fn test_unsalted_value_rejected() {
        assert!(!verify_password("anything", "no-separator-here"));
    }
}
