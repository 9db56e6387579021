//! Escrow Gateway - session-scoped surface for the presentation layer
//!
//! Composes the directory, ledger, registry and stats layer behind the
//! request/response contract the frontend calls. Every authenticated
//! call takes an explicit session id; session state lives here rather
//! than in process-wide globals, and state changes are published on a
//! broadcast channel instead of a listener set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::{
    directory::UserDirectory,
    error::EscrowError,
    identity::Identity,
    ledger::AccountLedger,
    models::{Escrow, EscrowStats},
    registry::{EscrowRegistry, RegistryConfig},
    stats::{StatsService, UserSummary},
    EscrowResult,
};

/// Configuration for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Registry configuration
    pub registry: RegistryConfig,
    /// Capacity of the session event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            event_channel_capacity: 64,
        }
    }
}

/// Opaque session token handed out at login
pub type SessionId = Uuid;

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub identity: Identity,
    pub started_at: DateTime<Utc>,
}

/// Session state change, published to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoggedIn {
        username: String,
        identity: Identity,
    },
    LoggedOut {
        username: String,
    },
}

/// Main gateway coordinating all components
pub struct EscrowGateway {
    directory: Arc<UserDirectory>,
    ledger: Arc<AccountLedger>,
    registry: Arc<EscrowRegistry>,
    stats: StatsService,
    sessions: RwLock<HashMap<SessionId, Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl EscrowGateway {
    /// Create a gateway with fresh component state
    pub fn new(config: GatewayConfig) -> Self {
        let ledger = Arc::new(AccountLedger::new());
        let registry = Arc::new(EscrowRegistry::new(config.registry, ledger.clone()));
        let stats = StatsService::new(registry.clone());
        let (events, _) = broadcast::channel(config.event_channel_capacity);

        Self {
            directory: Arc::new(UserDirectory::new()),
            ledger,
            registry,
            stats,
            sessions: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to session state changes
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Register a new username bound to a credential proof
    pub async fn register(&self, username: &str, credential: &[u8]) -> EscrowResult<String> {
        self.directory.register(username, credential).await?;
        Ok(format!("User '{username}' registered successfully"))
    }

    /// Verify the credential, derive the caller's identity server-side
    /// and open a session
    pub async fn login(
        &self,
        username: &str,
        credential: &[u8],
    ) -> EscrowResult<(SessionId, String)> {
        let identity = self.directory.verify(username, credential).await?;

        let session_id = Uuid::new_v4();
        self.sessions.write().await.insert(
            session_id,
            Session {
                username: username.to_string(),
                identity,
                started_at: Utc::now(),
            },
        );

        // A send error only means there are no subscribers
        let _ = self.events.send(SessionEvent::LoggedIn {
            username: username.to_string(),
            identity,
        });

        info!("Opened session {} for '{}'", session_id, username);

        Ok((session_id, format!("Logged in as {username}")))
    }

    /// Close a session
    pub async fn logout(&self, session: &SessionId) -> EscrowResult<String> {
        let removed = self
            .sessions
            .write()
            .await
            .remove(session)
            .ok_or_else(|| EscrowError::forbidden("no active session"))?;

        let _ = self.events.send(SessionEvent::LoggedOut {
            username: removed.username.clone(),
        });

        info!("Closed session {} for '{}'", session, removed.username);

        Ok(format!("Logged out {}", removed.username))
    }

    /// Human-readable login status for the session
    pub async fn login_status(&self, session: &SessionId) -> EscrowResult<String> {
        let session = self.session(session).await?;
        Ok(format!("Logged in as {}", session.username))
    }

    /// Derived identity of the current session
    pub async fn my_user_id(&self, session: &SessionId) -> EscrowResult<Identity> {
        Ok(self.session(session).await?.identity)
    }

    /// Balance of the calling identity
    pub async fn user_balance(&self, session: &SessionId) -> EscrowResult<u64> {
        let session = self.session(session).await?;
        Ok(self.ledger.balance(&session.identity).await)
    }

    /// Deposit into the calling identity's account; returns the new
    /// balance
    pub async fn add_balance(&self, session: &SessionId, amount: u64) -> EscrowResult<u64> {
        let session = self.session(session).await?;
        self.ledger.deposit(&session.identity, amount).await
    }

    /// Open an escrow towards a registered seller username
    pub async fn create_escrow(
        &self,
        session: &SessionId,
        seller_username: &str,
        amount: u64,
        description: String,
    ) -> EscrowResult<u64> {
        let session = self.session(session).await?;
        let seller = self.directory.resolve(seller_username).await?;
        self.registry
            .create_escrow(session.identity, seller, amount, description)
            .await
    }

    /// All escrows the caller participates in, in creation order
    pub async fn user_escrows(&self, session: &SessionId) -> EscrowResult<Vec<Escrow>> {
        let session = self.session(session).await?;
        Ok(self.registry.user_escrows(&session.identity).await)
    }

    /// Caller's escrows split by role (buyer side, seller side)
    pub async fn user_escrows_by_role(
        &self,
        session: &SessionId,
    ) -> EscrowResult<(Vec<Escrow>, Vec<Escrow>)> {
        let session = self.session(session).await?;
        let as_buyer = self.registry.buyer_escrows(&session.identity).await;
        let as_seller = self.registry.seller_escrows(&session.identity).await;
        Ok((as_buyer, as_seller))
    }

    /// Look up a single escrow
    pub async fn escrow(&self, session: &SessionId, id: u64) -> EscrowResult<Escrow> {
        self.session(session).await?;
        self.registry.get_escrow(id).await
    }

    /// Buyer confirms delivery on an escrow
    pub async fn confirm_delivery(&self, session: &SessionId, id: u64) -> EscrowResult<String> {
        let session = self.session(session).await?;
        self.registry.confirm_delivery(id, &session.identity).await?;
        Ok(format!("Delivery confirmed; escrow {id} completed"))
    }

    /// Buyer cancels a pending escrow
    pub async fn cancel_escrow(&self, session: &SessionId, id: u64) -> EscrowResult<String> {
        let session = self.session(session).await?;
        self.registry.cancel_escrow(id, &session.identity).await?;
        Ok(format!("Escrow {id} cancelled; funds returned"))
    }

    /// Seller refunds a pending escrow to the buyer
    pub async fn refund_escrow(&self, session: &SessionId, id: u64) -> EscrowResult<String> {
        let session = self.session(session).await?;
        self.registry.refund_escrow(id, &session.identity).await?;
        Ok(format!("Escrow {id} refunded to the buyer"))
    }

    /// System-wide escrow statistics
    pub async fn stats(&self) -> EscrowResult<EscrowStats> {
        self.stats.stats().await
    }

    /// Caller's participation summary
    pub async fn user_summary(&self, session: &SessionId) -> EscrowResult<UserSummary> {
        let session = self.session(session).await?;
        self.stats.user_summary(&session.identity).await
    }

    async fn session(&self, id: &SessionId) -> EscrowResult<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EscrowError::forbidden("no active session"))
    }
}

impl Default for EscrowGateway {
    fn default() -> Self {
        Self::new(GatewayConfig::default())
    }
}
