//! Secret generation and hashing.
//!
//! # Security
//!
//! - Codes, tokens and nonces are random alphanumeric strings from the
//!   thread-local CSPRNG
//! - They are stored as SHA-256 hex digests; hashing is deterministic so
//!   the digest doubles as the lookup key
//! - Passwords use Argon2id with a random salt from OsRng

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

/// Generates `len` random alphanumeric characters.
///
/// # Example
///
/// ```
/// use tokenforge_auth::secret;
///
/// let code = secret::generate(9);
/// assert_eq!(code.len(), 9);
/// ```
#[must_use]
pub fn generate(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hashes a plaintext credential into its storable form.
#[must_use]
pub fn hash(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes a password for storage using Argon2id.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored Argon2 PHC string.
///
/// Returns `Err` only if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}
