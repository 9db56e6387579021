//! Account Ledger - balances per derived identity
//!
//! Holds a non-negative balance per identity. Accounts are created
//! lazily on first credit; unknown identities read as zero. Every
//! mutation holds the single write lock for the whole check-and-update,
//! so concurrent reserves can never double-spend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::{error::EscrowError, identity::Identity, EscrowResult};

/// Ledger of account balances in the smallest currency unit
#[derive(Debug, Default)]
pub struct AccountLedger {
    balances: Arc<RwLock<HashMap<Identity, u64>>>,
}

impl AccountLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance; zero for unknown identities
    pub async fn balance(&self, identity: &Identity) -> u64 {
        self.balances
            .read()
            .await
            .get(identity)
            .copied()
            .unwrap_or(0)
    }

    /// Credit a deposit and return the new balance
    pub async fn deposit(&self, identity: &Identity, amount: u64) -> EscrowResult<u64> {
        if amount == 0 {
            return Err(EscrowError::invalid_input(
                "deposit amount must be greater than 0",
            ));
        }

        let mut balances = self.balances.write().await;
        let balance = balances.entry(*identity).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| EscrowError::overflow("deposit exceeds the representable balance"))?;

        info!("Deposited {} to {} (balance: {})", amount, identity, *balance);

        Ok(*balance)
    }

    /// Atomically check-and-debit the available balance
    pub async fn reserve(&self, identity: &Identity, amount: u64) -> EscrowResult<()> {
        if amount == 0 {
            return Err(EscrowError::invalid_input(
                "reserve amount must be greater than 0",
            ));
        }

        let mut balances = self.balances.write().await;
        let available = balances.get(identity).copied().unwrap_or(0);
        if available < amount {
            return Err(EscrowError::insufficient_funds(available, amount));
        }
        balances.insert(*identity, available - amount);

        info!(
            "Reserved {} from {} (balance: {})",
            amount,
            identity,
            available - amount
        );

        Ok(())
    }

    /// Credit funds back (escrow release or refund) and return the new
    /// balance
    pub async fn release(&self, identity: &Identity, amount: u64) -> EscrowResult<u64> {
        if amount == 0 {
            return Err(EscrowError::invalid_input(
                "release amount must be greater than 0",
            ));
        }

        let mut balances = self.balances.write().await;
        let balance = balances.entry(*identity).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| EscrowError::overflow("release exceeds the representable balance"))?;

        info!("Released {} to {} (balance: {})", amount, identity, *balance);

        Ok(*balance)
    }
}
