//! Worker credential: acquisition, shared cell and rotation.
//!
//! The current credential lives in a [`TokenCell`]. The refresher task
//! writes it on schedule; executions read it just before each status
//! emission, so a rotation that lands mid-mission is picked up by the
//! terminal report. A credential found expired at terminal time gets one
//! extra refresh from the execution itself.

use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Token as returned by the issuing endpoint.
#[derive(Clone, Deserialize)]
pub struct IssuedCredential {
    pub token: String,
    pub ttl_secs: u64,
}

/// A live credential and when it was obtained.
pub struct Credential {
    token: Zeroizing<String>,
    ttl: Duration,
    obtained_at: Instant,
}

impl Credential {
    pub fn new(token: String, ttl: Duration, obtained_at: Instant) -> Self {
        Self {
            token: Zeroizing::new(token),
            ttl,
            obtained_at,
        }
    }

    /// Raw token for signing a status event
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> Instant {
        self.obtained_at + self.ttl
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }

    /// When to request the next token. A margin at least as long as the TTL
    /// falls back to half the TTL.
    pub fn refresh_at(&self, margin: Duration) -> Instant {
        let lead = if margin < self.ttl {
            self.ttl - margin
        } else {
            self.ttl / 2
        };
        self.obtained_at + lead
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Current credential, shared between the refresher and executions.
pub struct TokenCell {
    inner: RwLock<Arc<Credential>>,
}

impl TokenCell {
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: RwLock::new(Arc::new(credential)),
        }
    }

    /// Snapshot of the current credential
    pub async fn current(&self) -> Arc<Credential> {
        Arc::clone(&*self.inner.read().await)
    }

    pub async fn replace(&self, credential: Credential) {
        *self.inner.write().await = Arc::new(credential);
    }
}

/// Source of fresh tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, worker_id: &str, secret: &str) -> WorkerResult<IssuedCredential>;
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    soldier_id: &'a str,
    secret: &'a str,
}

/// Requests tokens from the commander's `/token/issue` endpoint.
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenIssuer {
    pub fn new(commander_url: &str) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/token/issue", commander_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, worker_id: &str, secret: &str) -> WorkerResult<IssuedCredential> {
        let resp = self
            .client
            .post(&self.url)
            .json(&IssueRequest {
                soldier_id: worker_id,
                secret,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WorkerError::Rejected(status.as_u16()));
        }
        Ok(resp.json::<IssuedCredential>().await?)
    }
}

/// Keeps the worker's [`TokenCell`] populated with a valid credential.
pub struct TokenManager {
    issuer: Arc<dyn TokenIssuer>,
    worker_id: String,
    secret: Zeroizing<String>,
    cell: TokenCell,
    // Serializes token requests; each issue supersedes the previous token
    rotation: Mutex<()>,
    margin: Duration,
    retry_delay: Duration,
}

impl TokenManager {
    /// Obtain the first token, retrying with `retry_delay` until it succeeds.
    pub async fn bootstrap(
        issuer: Arc<dyn TokenIssuer>,
        worker_id: impl Into<String>,
        secret: Zeroizing<String>,
        margin: Duration,
        retry_delay: Duration,
    ) -> Self {
        let worker_id = worker_id.into();
        let first = loop {
            match issuer.issue(&worker_id, &secret).await {
                Ok(issued) => break issued,
                Err(e) => {
                    warn!(worker_id = %worker_id, error = %e, "Initial token request failed, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
            }
        };
        info!(worker_id = %worker_id, ttl_secs = first.ttl_secs, "Obtained token");

        Self {
            cell: TokenCell::new(Credential::new(
                first.token,
                Duration::from_secs(first.ttl_secs),
                Instant::now(),
            )),
            issuer,
            worker_id,
            secret,
            rotation: Mutex::new(()),
            margin,
            retry_delay,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Current credential, possibly expired.
    pub async fn current(&self) -> Arc<Credential> {
        self.cell.current().await
    }

    /// One token request; on success the cell is updated.
    pub async fn refresh_once(&self) -> WorkerResult<Arc<Credential>> {
        let _rotation = self.rotation.lock().await;
        self.rotate().await
    }

    async fn rotate(&self) -> WorkerResult<Arc<Credential>> {
        let issued = self.issuer.issue(&self.worker_id, &self.secret).await?;
        let ttl_secs = issued.ttl_secs;
        self.cell
            .replace(Credential::new(
                issued.token,
                Duration::from_secs(ttl_secs),
                Instant::now(),
            ))
            .await;
        info!(worker_id = %self.worker_id, ttl_secs, "Rotated token");
        Ok(self.cell.current().await)
    }

    /// Credential to sign a terminal status with.
    ///
    /// An already-expired credential gets one synchronous refresh attempt;
    /// if that fails the last credential is used anyway. Concurrent callers
    /// share a single refresh.
    pub async fn for_terminal(&self) -> Arc<Credential> {
        let current = self.cell.current().await;
        if !current.is_expired() {
            return current;
        }

        let _rotation = self.rotation.lock().await;
        let current = self.cell.current().await;
        if !current.is_expired() {
            debug!(worker_id = %self.worker_id, "Token rotated while waiting, reusing it");
            return current;
        }
        match self.rotate().await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "Token expired and refresh failed; reporting with last token"
                );
                current
            }
        }
    }

    /// Rotate forever: sleep until `ttl - margin`, then request a new
    /// token, retrying with a fixed delay until one arrives.
    ///
    /// Each attempt first checks whether another caller already rotated.
    pub async fn run_refresher(self: Arc<Self>) {
        loop {
            let due = self.cell.current().await.refresh_at(self.margin);
            tokio::time::sleep_until(due).await;

            loop {
                let rotation = self.rotation.lock().await;
                if self.cell.current().await.refresh_at(self.margin) > Instant::now() {
                    debug!(worker_id = %self.worker_id, "Token already rotated, rescheduling");
                    break;
                }
                match self.rotate().await {
                    Ok(_) => break,
                    Err(e) => {
                        drop(rotation);
                        warn!(worker_id = %self.worker_id, error = %e, "Token refresh failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
    }
}
