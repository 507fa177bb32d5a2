//! Password hashing and verification.
//!
//! The rest of the crate only sees the `CredentialVerifier` trait; the default
//! implementation is Argon2id with PHC-formatted hashes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{OAuthError, OAuthResult};

/// Opaque credential capability consumed by the account registry.
pub trait CredentialVerifier: Send + Sync {
    /// Hash a plaintext password for storage.
    fn hash(&self, password: &str) -> OAuthResult<String>;

    /// Check a candidate password against a stored hash.
    ///
    /// A malformed stored hash verifies as false.
    fn verify(&self, stored_hash: &str, candidate: &str) -> bool;
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self { memory_cost: 19 * 1024, time_cost: 2, parallelism: 1 }
    }
}

impl Argon2Config {
    /// Low memory config for testing (faster but less secure)
    #[must_use]
    pub const fn testing() -> Self {
        Self { memory_cost: 1024, time_cost: 1, parallelism: 1 }
    }
}

/// Argon2id-backed credential verifier.
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    pub fn new(config: Argon2Config) -> OAuthResult<Self> {
        let params = Params::new(config.memory_cost, config.time_cost, config.parallelism, None)
            .map_err(|e| OAuthError::internal(format!("invalid Argon2 params: {e}")))?;

        Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self { argon2: Argon2::default() }
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> OAuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| OAuthError::internal(format!("failed to hash password: {e}")))
    }

    fn verify(&self, stored_hash: &str, candidate: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        self.argon2.verify_password(candidate.as_bytes(), &parsed).is_ok()
    }
}

impl std::fmt::Debug for Argon2Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Verifier").finish()
    }
}
