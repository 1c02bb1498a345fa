//! Identity and credential management for Sortie workers.
//!
//! Workers prove who they are when reporting mission status by presenting a
//! short-lived token. This crate owns that credential lifecycle:
//!
//! - **Bootstrap**: a worker exchanges the shared bootstrap secret for a
//!   token; the secret is checked against an Argon2id hash
//! - **Storage**: only the SHA-256 of each token is persisted, keyed by
//!   worker identity, expiring with the token
//! - **Rotation**: re-issuing supersedes the previous token immediately;
//!   refresh is always initiated by the worker
//! - **Validation**: constant-time, fail-closed

pub mod authority;
pub mod bootstrap;
pub mod error;
pub mod token;

pub use authority::{
    CredentialRecord, CredentialSummary, IssuedToken, TokenAuthority, DEFAULT_TOKEN_TTL,
    TOKEN_KEY_PREFIX,
};
pub use bootstrap::{Argon2Cost, BootstrapVerifier};
pub use error::{IdentityError, IdentityResult};
pub use token::{generate_token, hash_token};
