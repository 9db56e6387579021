//! Escrow Registry - escrow records and their lifecycle
//!
//! Owns the set of escrow records and drives the
//! `Pending -> Completed | Cancelled | Refunded` state machine,
//! reserving and releasing funds against the account ledger. The
//! registry write lock is held across each paired ledger call and record
//! mutation, so a reservation is never observable without its escrow
//! record and vice versa.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    error::EscrowError,
    identity::Identity,
    ledger::AccountLedger,
    models::{AuditEvent, Escrow, EscrowStatus},
    EscrowResult,
};

/// Configuration for the escrow registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum escrow amount in smallest currency units
    pub max_escrow_amount: u64,
    /// Maximum description length in bytes
    pub max_description_bytes: usize,
    /// Permit a buyer to open an escrow with themselves as seller.
    /// Rejected by default; kept configurable as a policy knob.
    pub allow_self_dealing: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_escrow_amount: 1_000_000_000_000,
            max_description_bytes: 1024,
            allow_self_dealing: false,
        }
    }
}

/// Escrow records keyed by id, plus the id allocator
#[derive(Debug)]
struct EscrowTable {
    records: BTreeMap<u64, Escrow>,
    next_id: u64,
}

impl Default for EscrowTable {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Registry owning escrow records and the audit trail
#[derive(Debug)]
pub struct EscrowRegistry {
    config: RegistryConfig,
    escrows: RwLock<EscrowTable>,
    events: RwLock<Vec<AuditEvent>>,
    ledger: Arc<AccountLedger>,
}

impl EscrowRegistry {
    /// Create a new registry backed by the given ledger
    pub fn new(config: RegistryConfig, ledger: Arc<AccountLedger>) -> Self {
        Self {
            config,
            escrows: RwLock::new(EscrowTable::default()),
            events: RwLock::new(Vec::new()),
            ledger,
        }
    }

    /// The ledger this registry settles against
    pub fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    /// Create a pending escrow, reserving the amount from the buyer.
    ///
    /// Reservation and record creation are atomic: if anything fails
    /// after the reserve, the debit is released before the error is
    /// returned.
    pub async fn create_escrow(
        &self,
        buyer: Identity,
        seller: Identity,
        amount: u64,
        description: String,
    ) -> EscrowResult<u64> {
        if amount == 0 {
            return Err(EscrowError::invalid_input(
                "escrow amount must be greater than 0",
            ));
        }
        if amount > self.config.max_escrow_amount {
            return Err(EscrowError::invalid_input(format!(
                "escrow amount {} exceeds maximum {}",
                amount, self.config.max_escrow_amount
            )));
        }
        if description.len() > self.config.max_description_bytes {
            return Err(EscrowError::invalid_input(format!(
                "description exceeds {} bytes",
                self.config.max_description_bytes
            )));
        }
        if buyer == seller && !self.config.allow_self_dealing {
            return Err(EscrowError::invalid_input(
                "buyer and seller must be distinct",
            ));
        }

        let mut table = self.escrows.write().await;

        self.ledger.reserve(&buyer, amount).await?;

        let id = table.next_id;
        let Some(next_id) = id.checked_add(1) else {
            // Roll the reservation back before surfacing the failure
            self.ledger.release(&buyer, amount).await?;
            warn!("Escrow id space exhausted; reservation rolled back");
            return Err(EscrowError::internal("escrow id space exhausted"));
        };
        table.next_id = next_id;

        let metadata = serde_json::json!({ "description": &description });
        let escrow = Escrow::new(id, buyer, seller, amount, description);
        table.records.insert(id, escrow);

        self.record_event(
            "escrow.created",
            Some(id),
            Some(buyer),
            Some(amount),
            Some(metadata),
        )
        .await;

        info!("Created escrow {} ({} from {})", id, amount, buyer);

        Ok(id)
    }

    /// Buyer confirms delivery; funds move to the seller
    pub async fn confirm_delivery(&self, id: u64, caller: &Identity) -> EscrowResult<()> {
        let mut table = self.escrows.write().await;
        let escrow = Self::record_mut(&mut table, id)?;

        if escrow.buyer != *caller {
            return Err(EscrowError::forbidden(
                "only the buyer may confirm delivery",
            ));
        }
        escrow.validate_transition(EscrowStatus::Completed)?;

        let seller = escrow.seller;
        let amount = escrow.amount;
        self.ledger.release(&seller, amount).await?;

        escrow.status = EscrowStatus::Completed;
        escrow.resolved_at = Some(Utc::now());

        self.record_event(
            "escrow.completed",
            Some(id),
            Some(*caller),
            Some(amount),
            None,
        )
        .await;

        info!("Completed escrow {} ({} to {})", id, amount, seller);

        Ok(())
    }

    /// Buyer cancels a pending escrow; funds return to the buyer
    pub async fn cancel_escrow(&self, id: u64, caller: &Identity) -> EscrowResult<()> {
        let mut table = self.escrows.write().await;
        let escrow = Self::record_mut(&mut table, id)?;

        if escrow.buyer != *caller {
            return Err(EscrowError::forbidden("only the buyer may cancel"));
        }
        escrow.validate_transition(EscrowStatus::Cancelled)?;

        let buyer = escrow.buyer;
        let amount = escrow.amount;
        self.ledger.release(&buyer, amount).await?;

        escrow.status = EscrowStatus::Cancelled;
        escrow.resolved_at = Some(Utc::now());

        self.record_event(
            "escrow.cancelled",
            Some(id),
            Some(*caller),
            Some(amount),
            None,
        )
        .await;

        info!("Cancelled escrow {} ({} back to {})", id, amount, buyer);

        Ok(())
    }

    /// Seller returns a pending escrow to the buyer
    pub async fn refund_escrow(&self, id: u64, caller: &Identity) -> EscrowResult<()> {
        let mut table = self.escrows.write().await;
        let escrow = Self::record_mut(&mut table, id)?;

        if escrow.seller != *caller {
            return Err(EscrowError::forbidden("only the seller may refund"));
        }
        escrow.validate_transition(EscrowStatus::Refunded)?;

        let buyer = escrow.buyer;
        let amount = escrow.amount;
        self.ledger.release(&buyer, amount).await?;

        escrow.status = EscrowStatus::Refunded;
        escrow.resolved_at = Some(Utc::now());

        self.record_event(
            "escrow.refunded",
            Some(id),
            Some(*caller),
            Some(amount),
            None,
        )
        .await;

        info!("Refunded escrow {} ({} back to {})", id, amount, buyer);

        Ok(())
    }

    /// Get an escrow by id
    pub async fn get_escrow(&self, id: u64) -> EscrowResult<Escrow> {
        self.escrows
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| EscrowError::not_found(format!("escrow {id}")))
    }

    /// All escrows where the identity is buyer or seller, in creation
    /// order
    pub async fn user_escrows(&self, identity: &Identity) -> Vec<Escrow> {
        self.escrows
            .read()
            .await
            .records
            .values()
            .filter(|escrow| escrow.is_party(identity))
            .cloned()
            .collect()
    }

    /// Escrows where the identity is the buyer
    pub async fn buyer_escrows(&self, identity: &Identity) -> Vec<Escrow> {
        self.escrows
            .read()
            .await
            .records
            .values()
            .filter(|escrow| escrow.buyer == *identity)
            .cloned()
            .collect()
    }

    /// Escrows where the identity is the seller
    pub async fn seller_escrows(&self, identity: &Identity) -> Vec<Escrow> {
        self.escrows
            .read()
            .await
            .records
            .values()
            .filter(|escrow| escrow.seller == *identity)
            .cloned()
            .collect()
    }

    /// Snapshot of the full escrow set under a single read lock
    pub async fn all_escrows(&self) -> Vec<Escrow> {
        self.escrows.read().await.records.values().cloned().collect()
    }

    /// Audit events recorded for one escrow
    pub async fn escrow_events(&self, id: u64) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.escrow_id == Some(id))
            .cloned()
            .collect()
    }

    fn record_mut(table: &mut EscrowTable, id: u64) -> EscrowResult<&mut Escrow> {
        table
            .records
            .get_mut(&id)
            .ok_or_else(|| EscrowError::not_found(format!("escrow {id}")))
    }

    async fn record_event(
        &self,
        event_type: &str,
        escrow_id: Option<u64>,
        actor: Option<Identity>,
        amount: Option<u64>,
        metadata: Option<serde_json::Value>,
    ) {
        self.events.write().await.push(AuditEvent {
            event_type: event_type.to_string(),
            escrow_id,
            actor,
            amount,
            metadata,
            created_at: Utc::now(),
        });
    }
}
