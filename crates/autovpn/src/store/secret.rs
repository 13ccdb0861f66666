//! Secret hashing and generation.
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$...`) carrying their own
//! salt and parameters. Verification re-derives the hash with the stored salt
//! and parameters and compares the raw outputs in constant time.

use crate::error::Result;
use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::distr::Alphanumeric;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Length of generated app password secrets.
pub const GENERATED_SECRET_LEN: usize = 24;

/// Raw salt bytes per hash (22 characters once base64 encoded).
const SALT_LEN: usize = 16;

pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; SALT_LEN]>())?;
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Returns `true` when `secret` matches `stored`. A stored value that is not a
/// valid PHC string never matches.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    match rederive(secret, stored) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("[!] Stored credential hash is unreadable: {}", e);
            false
        }
    }
}

fn rederive(secret: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)?;
    let params = Params::try_from(&parsed)?;
    let (Some(expected), Some(salt)) = (parsed.hash, parsed.salt) else {
        return Ok(false);
    };
    let derived = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(secret.as_bytes(), salt)?;

    Ok(derived
        .hash
        .map(|h| bool::from(h.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false))
}

/// Random alphanumeric secret for a new app password.
pub fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}
