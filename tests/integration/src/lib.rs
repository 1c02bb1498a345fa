//! End-to-end tests for the commander and worker pipeline
//!
//! This test suite validates, over the in-memory store and broker:
//! - Mission submission through the HTTP API and delivery to workers
//! - Direct addressing and competing consumers on the shared queue
//! - Token issuance, rotation and rejection of superseded tokens
//! - Out-of-order and duplicate status delivery
//! - Outbox recovery after a failed publish

pub mod test_utils;

#[cfg(test)]
mod pipeline_tests;

#[cfg(test)]
mod status_ordering_tests;

#[cfg(test)]
mod token_rotation_tests;
