//! Error types for the escrow core
//!
//! Every core operation returns a typed result; failures carry a stable
//! machine-checkable kind plus a human-readable message, and none are
//! retried internally.

use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Malformed username, amount, description or credential
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Available balance is short of the requested debit
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    /// Unknown escrow, username or identity
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not a party to the escrow, holds the wrong role, or has
    /// no active session
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Illegal transition attempted on a non-pending escrow
    #[error("invalid state transition: {from} -> {to}: {reason}")]
    InvalidState {
        from: String,
        to: String,
        reason: String,
    },

    /// Arithmetic bound exceeded
    #[error("overflow: {0}")]
    Overflow(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an insufficient funds error
    pub fn insufficient_funds(available: u64, required: u64) -> Self {
        Self::InsufficientFunds {
            available,
            required,
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state<S: Into<String>>(from: S, to: S, reason: S) -> Self {
        Self::InvalidState {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow<S: Into<String>>(msg: S) -> Self {
        Self::Overflow(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable kind label for wire-level dispatch
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState { .. } => "invalid_state",
            Self::Overflow(_) => "overflow",
            Self::Internal(_) => "internal",
        }
    }
}
