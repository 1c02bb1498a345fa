//! Token authority: issues, stores and validates worker credentials.
//!
//! One credential per worker identity lives at `token:{worker_id}`. The
//! stored record carries only the SHA-256 of the raw token and expires with
//! the token's TTL. Issuing again overwrites the record, which invalidates
//! the previous raw token at once, whatever TTL it had left.

use crate::bootstrap::BootstrapVerifier;
use crate::error::{IdentityError, IdentityResult};
use crate::token::{digests_match, generate_token, hash_token};
use serde::{Deserialize, Serialize};
use sortie_core::{unix_now_secs, KvStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store key prefix for credential records
pub const TOKEN_KEY_PREFIX: &str = "token:";

/// Default credential lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30);

fn token_key(worker_id: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{worker_id}")
}

/// Persisted credential record. Never contains the raw token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Worker identity the credential belongs to
    pub worker_id: String,
    /// Hex SHA-256 of the raw token
    pub credential_hash: String,
    /// Issue time, Unix seconds
    pub issued_at: i64,
    /// Lifetime in seconds
    pub ttl_secs: u64,
}

/// Raw token handed back exactly once by [`TokenAuthority::issue`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedToken {
    /// Raw token
    pub token: String,
    /// Lifetime in seconds
    pub ttl_secs: u64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Admin view of a live credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialSummary {
    /// Worker identity
    pub soldier_id: String,
    /// Hex SHA-256 of the current token
    pub token_hash: String,
    /// Seconds until expiry
    pub ttl_secs: u64,
}

/// Issues and validates identity-scoped rotating credentials.
#[derive(Clone)]
pub struct TokenAuthority {
    store: Arc<dyn KvStore>,
    bootstrap: Arc<BootstrapVerifier>,
    ttl: Duration,
}

impl TokenAuthority {
    /// Create an authority over `store` with the given bootstrap verifier
    pub fn new(store: Arc<dyn KvStore>, bootstrap: BootstrapVerifier, ttl: Duration) -> Self {
        Self {
            store,
            bootstrap: Arc::new(bootstrap),
            ttl,
        }
    }

    /// Credential lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `worker_id`.
    ///
    /// Fails with [`IdentityError::InvalidSecret`] without touching the store
    /// when `bootstrap_secret` does not verify.
    pub async fn issue(&self, worker_id: &str, bootstrap_secret: &str) -> IdentityResult<IssuedToken> {
        if worker_id.is_empty() {
            return Err(IdentityError::MissingField("soldier_id"));
        }
        if bootstrap_secret.is_empty() {
            return Err(IdentityError::MissingField("secret"));
        }

        let verifier = Arc::clone(&self.bootstrap);
        let candidate = zeroize::Zeroizing::new(bootstrap_secret.to_string());
        let verified = tokio::task::spawn_blocking(move || verifier.verify(&candidate))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))?;

        if !verified {
            warn!(worker_id = %worker_id, "Rejected token request: invalid bootstrap secret");
            return Err(IdentityError::InvalidSecret);
        }

        let token = generate_token();
        let record = CredentialRecord {
            worker_id: worker_id.to_string(),
            credential_hash: hash_token(&token),
            issued_at: unix_now_secs(),
            ttl_secs: self.ttl.as_secs(),
        };
        let encoded = serde_json::to_string(&record)?;
        self.store
            .set(&token_key(worker_id), &encoded, Some(self.ttl))
            .await?;

        info!(worker_id = %worker_id, ttl_secs = record.ttl_secs, "Issued token");

        Ok(IssuedToken {
            token,
            ttl_secs: record.ttl_secs,
        })
    }

    /// Check `token` against the current credential of `worker_id`.
    ///
    /// Fails closed: a missing or expired record, a store error, an
    /// unreadable record or a digest mismatch all yield `false`.
    pub async fn validate(&self, token: &str, worker_id: &str) -> bool {
        if token.is_empty() || worker_id.is_empty() {
            return false;
        }

        let stored = match self.store.get(&token_key(worker_id)).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                debug!(worker_id = %worker_id, "No live credential");
                return false;
            }
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "Credential lookup failed");
                return false;
            }
        };

        let record: CredentialRecord = match serde_json::from_str(&stored) {
            Ok(record) => record,
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "Unreadable credential record");
                return false;
            }
        };

        digests_match(&record.credential_hash, &hash_token(token))
    }

    /// Live credentials with their remaining TTL. Raw tokens are never
    /// available here.
    pub async fn list_credentials(&self) -> IdentityResult<Vec<CredentialSummary>> {
        let mut summaries = Vec::new();

        for key in self.store.scan_prefix(TOKEN_KEY_PREFIX).await? {
            // Expired between SCAN and GET
            let Some(stored) = self.store.get(&key).await? else {
                continue;
            };
            let record: CredentialRecord = match serde_json::from_str(&stored) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable credential record");
                    continue;
                }
            };
            let ttl_secs = self
                .store
                .ttl(&key)
                .await?
                .map(|t| t.as_secs())
                .unwrap_or(0);

            summaries.push(CredentialSummary {
                soldier_id: record.worker_id,
                token_hash: record.credential_hash,
                ttl_secs,
            });
        }

        summaries.sort_by(|a, b| a.soldier_id.cmp(&b.soldier_id));
        Ok(summaries)
    }
}
