//! User directory - username registration and credential checks
//!
//! Binds each username to a digest of its credential proof and to the
//! identity derived at registration. Plain credential bytes are never
//! retained. The stored identity is what seller-username resolution
//! hands to the registry, so derivation stays server-side.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{error::EscrowError, identity, identity::Identity, EscrowResult};

#[derive(Debug, Clone)]
struct UserRecord {
    credential_digest: [u8; 32],
    identity: Identity,
    created_at: DateTime<Utc>,
}

/// Registered users keyed by username
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a username, binding it to the credential proof
    pub async fn register(&self, username: &str, credential: &[u8]) -> EscrowResult<()> {
        // Derivation validates the username and credential as a side
        // effect; its identity is stored for later resolution
        let derived = identity::derive(credential, username)?;

        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(EscrowError::invalid_input(format!(
                "username '{username}' is already taken"
            )));
        }
        users.insert(
            username.to_string(),
            UserRecord {
                credential_digest: Self::digest(credential),
                identity: derived,
                created_at: Utc::now(),
            },
        );

        info!("Registered user '{}' as {}", username, derived);

        Ok(())
    }

    /// Verify a credential proof and return the user's derived identity
    pub async fn verify(&self, username: &str, credential: &[u8]) -> EscrowResult<Identity> {
        let users = self.users.read().await;
        let record = users
            .get(username)
            .ok_or_else(|| EscrowError::not_found(format!("user '{username}'")))?;

        if record.credential_digest != Self::digest(credential) {
            warn!("Credential mismatch for user '{}'", username);
            return Err(EscrowError::forbidden("credential proof does not match"));
        }

        Ok(record.identity)
    }

    /// Resolve a registered username to its derived identity
    pub async fn resolve(&self, username: &str) -> EscrowResult<Identity> {
        self.users
            .read()
            .await
            .get(username)
            .map(|record| record.identity)
            .ok_or_else(|| EscrowError::not_found(format!("user '{username}'")))
    }

    /// When a username was registered
    pub async fn registered_at(&self, username: &str) -> EscrowResult<DateTime<Utc>> {
        self.users
            .read()
            .await
            .get(username)
            .map(|record| record.created_at)
            .ok_or_else(|| EscrowError::not_found(format!("user '{username}'")))
    }

    fn digest(credential: &[u8]) -> [u8; 32] {
        Sha256::digest(credential).into()
    }
}
