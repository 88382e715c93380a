//! Password Hashing
//!
//! One-way, salted, adaptive hashing of account passwords using Argon2id.
//!
//! Every call to [`PasswordHasher::hash`] draws a fresh salt from the OS
//! random source and embeds it, together with the algorithm parameters, in
//! the returned PHC string. [`PasswordHasher::verify`] therefore needs
//! nothing but the stored string and the candidate password.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::password::{HashingConfig, PasswordHasher};
//!
//! let hasher = PasswordHasher::new(&HashingConfig::default())?;
//! let stored = hasher.hash("correct horse battery staple")?;
//!
//! assert!(hasher.verify(&stored, "correct horse battery staple")?);
//! assert!(!hasher.verify(&stored, "wrong")?);
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

/// Argon2 work factor.
///
/// Fixed for the lifetime of a [`PasswordHasher`]; never chosen per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes over memory
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashingConfig {
    /// Argon2id with 19 MiB, 2 passes, 1 lane
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingConfig {
    /// Load the work factor from environment variables.
    ///
    /// - `HASH_MEMORY_KIB` (default: 19456)
    /// - `HASH_ITERATIONS` (default: 2)
    /// - `HASH_PARALLELISM` (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |name: &str, fallback: u32| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            memory_kib: read("HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: read("HASH_ITERATIONS", defaults.iterations),
            parallelism: read("HASH_PARALLELISM", defaults.parallelism),
        }
    }

    /// Smallest cost Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    /// The configured work factor is rejected by Argon2
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Hashing failed (entropy or resource failure)
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// The stored hash is not a parsable PHC string
    #[error("malformed password hash: {0}")]
    MalformedHash(String),
}

/// Salted, adaptive password hasher.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Create a hasher with the given work factor.
    pub fn new(config: &HashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`. Parameters are read from the stored hash,
    /// so hashes produced under an older work factor still verify.
    pub fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
        }
    }
}
