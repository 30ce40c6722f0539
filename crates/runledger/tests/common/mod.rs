//! Shared test utilities for runledger integration tests.
//!
//! - `LedgerHarness`: a ledger over a fresh database with a pinned clock
//! - builders for wire-level run and segment fixtures
//! - `spawn_backend` for serving an axum router in place of the
//!   extraction backend

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{spawn_backend, t0, LedgerHarness};
