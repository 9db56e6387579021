//! Core data models for the escrow system
//!
//! Escrow records, their lifecycle state machine, stats aggregates and
//! the audit event shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::EscrowError, identity::Identity, EscrowResult};

/// Escrow state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Funds reserved, awaiting buyer confirmation or cancellation
    Pending,
    /// Delivery confirmed, funds released to the seller
    Completed,
    /// Cancelled by the buyer, funds returned
    Cancelled,
    /// Returned to the buyer at the seller's initiative
    Refunded,
}

impl EscrowStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

/// Escrow record holding buyer funds in custody
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    /// Strictly increasing, never reused; doubles as a creation-order key
    pub id: u64,
    pub buyer: Identity,
    pub seller: Identity,
    /// Amount in the smallest currency unit
    pub amount: u64,
    pub description: String,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Escrow {
    /// Create a new pending escrow
    pub fn new(
        id: u64,
        buyer: Identity,
        seller: Identity,
        amount: u64,
        description: String,
    ) -> Self {
        Self {
            id,
            buyer,
            seller,
            amount,
            description,
            status: EscrowStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Check whether an identity is a party to this escrow
    pub fn is_party(&self, identity: &Identity) -> bool {
        self.buyer == *identity || self.seller == *identity
    }

    /// Validate a state transition; only `Pending -> terminal` is legal
    pub fn validate_transition(&self, to: EscrowStatus) -> EscrowResult<()> {
        if self.status == EscrowStatus::Pending && to.is_terminal() {
            Ok(())
        } else {
            Err(EscrowError::invalid_state(
                format!("{:?}", self.status),
                format!("{:?}", to),
                "escrow is not pending".to_string(),
            ))
        }
    }
}

/// Aggregate view over the live escrow set; recomputed on demand,
/// never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowStats {
    pub total_escrows: u64,
    pub pending_count: u64,
    pub completed_count: u64,
    pub cancelled_count: u64,
    pub refunded_count: u64,
    /// Sum of all escrow amounts ever created
    pub total_volume: u64,
    /// Sum of amounts currently held in pending escrows
    pub locked_volume: u64,
}

/// Append-only audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: String,
    pub escrow_id: Option<u64>,
    pub actor: Option<Identity>,
    pub amount: Option<u64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
