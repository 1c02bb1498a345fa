//! Bootstrap secret verification.
//!
//! The commander never keeps the configured bootstrap secret in plaintext
//! after start-up: it is hashed once with Argon2id under a random salt, and
//! every issuance request is verified against that PHC string. Argon2 is
//! memory-hard, so a leaked hash resists offline brute force, and the
//! verifier compares digests in constant time.

use crate::error::{IdentityError, IdentityResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Cost {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for Argon2Cost {
    /// t=1, m=64 MiB, p=4
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 1,
            parallelism: 4,
        }
    }
}

impl Argon2Cost {
    /// Output length of the derived key in bytes
    pub const OUTPUT_LEN: usize = 32;

    /// Cheap parameters for tests and local development.
    pub fn light() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> IdentityResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(Self::OUTPUT_LEN),
        )
        .map_err(|e| IdentityError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Verifies candidate bootstrap secrets against a stored Argon2id hash.
#[derive(Clone)]
pub struct BootstrapVerifier {
    phc: String,
    cost: Argon2Cost,
}

impl std::fmt::Debug for BootstrapVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapVerifier")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl BootstrapVerifier {
    /// Hash `secret` with production cost.
    pub fn new(secret: &str) -> IdentityResult<Self> {
        Self::with_cost(secret, Argon2Cost::default())
    }

    /// Hash `secret` with explicit cost parameters.
    pub fn with_cost(secret: &str, cost: Argon2Cost) -> IdentityResult<Self> {
        if secret.is_empty() {
            return Err(IdentityError::MissingField("bootstrap secret"));
        }
        let salt = SaltString::generate(&mut OsRng);
        let phc = cost
            .hasher()?
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| IdentityError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self { phc, cost })
    }

    /// The stored PHC string (`$argon2id$v=19$...`). Contains no plaintext.
    pub fn phc(&self) -> &str {
        &self.phc
    }

    /// Check `candidate` against the stored hash.
    ///
    /// CPU- and memory-heavy; async callers should run it on a blocking
    /// thread.
    pub fn verify(&self, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.phc) else {
            return false;
        };
        let Ok(hasher) = self.cost.hasher() else {
            return false;
        };
        hasher.verify_password(candidate.as_bytes(), &parsed).is_ok()
    }
}
