//! Sortie worker: consumes orders, executes missions, reports status.
//!
//! A worker holds one rotating credential ([`token::TokenManager`]), reads
//! its direct order stream and the shared stream, and runs at most N
//! missions at once ([`pool::Worker`]). Every status event it emits is
//! signed with the credential current at emission time.

pub mod config;
pub mod error;
pub mod executor;
pub mod pool;
pub mod token;

pub use config::Config;
pub use error::{WorkerError, WorkerResult};
pub use executor::{Execution, ExecutionProfile, MissionExecutor, SimulatedExecutor};
pub use pool::Worker;
pub use token::{Credential, HttpTokenIssuer, IssuedCredential, TokenCell, TokenIssuer, TokenManager};
