//! Query/Stats layer - read-only aggregation over the escrow registry
//!
//! Stats are recomputed from the live escrow set on every call, so they
//! can never drift from the authoritative records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    identity::Identity,
    models::{EscrowStats, EscrowStatus},
    registry::EscrowRegistry,
    EscrowResult,
};

/// Read-only stats service; depends on the registry only
#[derive(Debug, Clone)]
pub struct StatsService {
    registry: Arc<EscrowRegistry>,
}

/// Per-user escrow summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub as_buyer: u64,
    pub as_seller: u64,
    /// Completed volume paid out as buyer
    pub spent_volume: u64,
    /// Completed volume received as seller
    pub earned_volume: u64,
    /// Amount currently locked in pending escrows as buyer
    pub locked_volume: u64,
}

impl StatsService {
    /// Create a stats service over the given registry
    pub fn new(registry: Arc<EscrowRegistry>) -> Self {
        Self { registry }
    }

    /// Aggregate counts and volumes over the full escrow set
    pub async fn stats(&self) -> EscrowResult<EscrowStats> {
        let escrows = self.registry.all_escrows().await;

        let mut stats = EscrowStats {
            total_escrows: escrows.len() as u64,
            ..EscrowStats::default()
        };

        for escrow in &escrows {
            stats.total_volume = stats.total_volume.saturating_add(escrow.amount);
            match escrow.status {
                EscrowStatus::Pending => {
                    stats.pending_count += 1;
                    stats.locked_volume = stats.locked_volume.saturating_add(escrow.amount);
                }
                EscrowStatus::Completed => stats.completed_count += 1,
                EscrowStatus::Cancelled => stats.cancelled_count += 1,
                EscrowStatus::Refunded => stats.refunded_count += 1,
            }
        }

        Ok(stats)
    }

    /// Summary of one identity's participation
    pub async fn user_summary(&self, identity: &Identity) -> EscrowResult<UserSummary> {
        let escrows = self.registry.user_escrows(identity).await;

        let mut summary = UserSummary::default();
        for escrow in &escrows {
            if escrow.buyer == *identity {
                summary.as_buyer += 1;
                match escrow.status {
                    EscrowStatus::Pending => {
                        summary.locked_volume =
                            summary.locked_volume.saturating_add(escrow.amount);
                    }
                    EscrowStatus::Completed => {
                        summary.spent_volume = summary.spent_volume.saturating_add(escrow.amount);
                    }
                    _ => {}
                }
            }
            if escrow.seller == *identity {
                summary.as_seller += 1;
                if escrow.status == EscrowStatus::Completed {
                    summary.earned_volume = summary.earned_volume.saturating_add(escrow.amount);
                }
            }
        }

        Ok(summary)
    }
}
