//! Derived principal construction
//!
//! A derived identity binds a caller-proven base credential to a chosen
//! username, so one credential can operate several independent,
//! unlinkable identities. Derivation is a pure function of its inputs;
//! no mapping is stored and the username cannot be recovered from the
//! identity.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{error::EscrowError, EscrowResult};

/// Maximum username length in bytes
pub const MAX_USERNAME_BYTES: usize = 64;

/// Domain separation tag so derived identities never collide with other
/// SHA-256 uses of the same inputs
const DERIVATION_TAG: &[u8] = b"custodia/derived-identity/v1";

/// Opaque 32-byte application-specific identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Lowercase hex rendering, the wire form of an identity
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse an identity from its hex wire form
    pub fn from_hex(s: &str) -> EscrowResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| EscrowError::invalid_input(format!("malformed identity hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EscrowError::invalid_input("identity must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Validate a username against the registration rules
pub fn validate_username(username: &str) -> EscrowResult<()> {
    if username.is_empty() {
        return Err(EscrowError::invalid_input("username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(EscrowError::invalid_input(format!(
            "username exceeds {MAX_USERNAME_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Derive the stable identity for a (base credential, username) pair.
///
/// The credential is length-prefixed before hashing so the boundary
/// between credential and username bytes is unambiguous.
pub fn derive(base_credential: &[u8], username: &str) -> EscrowResult<Identity> {
    if base_credential.is_empty() {
        return Err(EscrowError::invalid_input("base credential cannot be empty"));
    }
    validate_username(username)?;

    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_TAG);
    hasher.update((base_credential.len() as u64).to_be_bytes());
    hasher.update(base_credential);
    hasher.update(username.as_bytes());

    Ok(Identity(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = derive(b"credential", "alice").unwrap();
        let b = derive(b"credential", "alice").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn usernames_yield_distinct_identities() {
        let alice = derive(b"credential", "alice").unwrap();
        let bob = derive(b"credential", "bob").unwrap();
        assert_ne!(alice, bob);
    }

    #[test]
    fn credentials_yield_distinct_identities() {
        let a = derive(b"credential-one", "alice").unwrap();
        let b = derive(b"credential-two", "alice").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn length_prefix_disambiguates_boundaries() {
        // Without the prefix both would hash the same byte stream
        let a = derive(b"ab", "c").unwrap();
        let b = derive(b"a", "bc").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_username_is_rejected() {
        let err = derive(b"credential", "").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn oversized_username_is_rejected() {
        let username = "a".repeat(MAX_USERNAME_BYTES + 1);
        let err = derive(b"credential", &username).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn empty_credential_is_rejected() {
        let err = derive(b"", "alice").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn hex_round_trip() {
        let identity = derive(b"credential", "alice").unwrap();
        let parsed = Identity::from_hex(&identity.to_hex()).unwrap();
        assert_eq!(identity, parsed);
        assert_eq!(identity.to_string().len(), 64);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(Identity::from_hex("not hex").is_err());
        assert!(Identity::from_hex("abcd").is_err());
    }
}
