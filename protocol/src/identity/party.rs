//! # Parties
//!
//! A [`Party`] is a well-known ledger identity: a human-readable name bound
//! to the Ed25519 owning key that signs on the party's behalf.
//!
//! Equality compares both fields. Two parties with the same key but
//! different names are different parties; the verification engine compares
//! keys when it checks signers and whole parties when it checks that issuer
//! and requester did not change across a transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::keys::RemitPublicKey;

/// A named ledger participant.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    name: String,
    owning_key: RemitPublicKey,
}

impl Party {
    /// Bind a display name to an owning key.
    pub fn new(name: impl Into<String>, owning_key: RemitPublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }

    /// The party's display name (e.g. `"PartyA"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key that signs for this party.
    pub fn owning_key(&self) -> &RemitPublicKey {
        &self.owning_key
    }

    /// Deterministic byte form used inside canonical transaction bytes.
    pub(crate) fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.name.len() + 32);
        buf.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(self.owning_key.as_bytes());
        buf
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({}, {:?})", self.name, self.owning_key)
    }
}
