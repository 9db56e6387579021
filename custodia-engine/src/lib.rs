//! Escrow ledger and identity-binding engine
//!
//! This crate implements the custodial core behind the Custodia frontend:
//! - Derivation of stable per-application identities from a base
//!   credential and a username
//! - A non-negative account ledger with atomic deposit/reserve/release
//! - An escrow registry with a Pending -> terminal state machine
//! - A read-only stats layer over the live escrow set
//! - A session gateway exposing the request/response surface the
//!   presentation layer calls

pub mod directory;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod stats;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
