//! Core type definitions for transfer-request transactions.
//!
//! [`TransferState`] is the only kind of ledger state the protocol manages.
//! Each version of it lives at a [`StateRef`] (an output slot of some
//! transaction) until a later transaction consumes it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::uid::transfer_request_uid;
use crate::crypto::keys::RemitPublicKey;
use crate::identity::Party;

// ---------------------------------------------------------------------------
// TransferCommand
// ---------------------------------------------------------------------------

/// The intent of a transaction. Exactly one per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferCommand {
    /// Create a pending request. Signed by issuer and requester.
    Request,
    /// Approve a pending request, possibly for less. Signed by issuer and requester.
    Approve,
    /// Refuse a pending request. Signed by the issuer alone.
    Decline,
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::Approve => write!(f, "Approve"),
            Self::Decline => write!(f, "Decline"),
        }
    }
}

/// A command together with the keys that must sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// What the transaction does.
    pub value: TransferCommand,
    /// Keys required to sign the transaction.
    pub signers: Vec<RemitPublicKey>,
}

impl Command {
    pub fn new(value: TransferCommand, signers: Vec<RemitPublicKey>) -> Self {
        Self { value, signers }
    }

    pub(crate) fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.signers.len() * 32);
        buf.extend_from_slice(self.value.to_string().as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&(self.signers.len() as u32).to_le_bytes());
        for signer in &self.signers {
            buf.extend_from_slice(signer.as_bytes());
        }
        buf
    }
}

// ---------------------------------------------------------------------------
// ValidUntil
// ---------------------------------------------------------------------------

/// Expiry of a transfer request.
///
/// Pending requests carry a concrete instant. Approval replaces it with
/// `Infinite`: an approved transfer never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidUntil {
    At(DateTime<Utc>),
    Infinite,
}

impl ValidUntil {
    /// Strictly later than `instant`. `Infinite` is after everything.
    pub fn is_after(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Self::At(t) => *t > instant,
            Self::Infinite => true,
        }
    }

    /// Strictly earlier than `instant`. `Infinite` is before nothing.
    pub fn is_before(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Self::At(t) => *t < instant,
            Self::Infinite => false,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl fmt::Display for ValidUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Self::Infinite => write!(f, "infinite"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferState
// ---------------------------------------------------------------------------

/// One version of a transfer request.
///
/// A request is created pending (`approved == false`) and then either
/// approved, which produces a terminal approved version with the same `uid`,
/// or declined, which consumes it without a successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferState {
    /// Content-derived id, stable across the whole lifeline.
    pub uid: String,
    /// Who pays. Countersigns Request and Approve, signs Decline alone.
    pub issuer: Party,
    /// Who gets paid. Countersigns Request and Approve.
    pub requester: Party,
    /// Parties notified once the request is approved. Compared as a set.
    pub observers: Vec<Party>,
    /// Requested value, then approved value.
    pub amount: i64,
    /// Creation instant.
    pub requested_at: DateTime<Utc>,
    /// Expiry while pending; `Infinite` once approved.
    pub valid_until: ValidUntil,
    /// Whether the issuer approved the request.
    pub approved: bool,
    pub title: String,
    pub description: String,
}

impl TransferState {
    /// Build a new pending request, deriving its uid from the creation fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new_request(
        issuer: Party,
        requester: Party,
        observers: Vec<Party>,
        amount: i64,
        requested_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let description = description.into();
        let uid = transfer_request_uid(
            issuer.owning_key(),
            requester.owning_key(),
            amount,
            requested_at,
            &title,
            &description,
        );
        Self {
            uid,
            issuer,
            requester,
            observers,
            amount,
            requested_at,
            valid_until: ValidUntil::At(valid_until),
            approved: false,
            title,
            description,
        }
    }

    /// The approved successor of this version, for `amount`.
    pub fn approved_for(&self, amount: i64) -> Self {
        Self {
            amount,
            valid_until: ValidUntil::Infinite,
            approved: true,
            ..self.clone()
        }
    }

    /// Parties that record this version in their vaults.
    ///
    /// A pending request concerns only its two counterparties; an approved
    /// one is shared with every observer.
    pub fn participants(&self) -> Vec<Party> {
        if self.approved {
            self.observers.clone()
        } else {
            vec![self.issuer.clone(), self.requester.clone()]
        }
    }

    /// Set equality of observers (order and duplicates ignored).
    pub fn same_observers(&self, other: &TransferState) -> bool {
        let ours: HashSet<&Party> = self.observers.iter().collect();
        let theirs: HashSet<&Party> = other.observers.iter().collect();
        ours.symmetric_difference(&theirs).next().is_none()
    }

    /// Deterministic byte form used for transaction ids.
    pub(crate) fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        put_str(&mut buf, &self.uid);
        buf.extend_from_slice(&self.issuer.canonical_bytes());
        buf.extend_from_slice(&self.requester.canonical_bytes());
        buf.extend_from_slice(&(self.observers.len() as u32).to_le_bytes());
        for observer in &self.observers {
            buf.extend_from_slice(&observer.canonical_bytes());
        }
        buf.extend_from_slice(&self.amount.to_le_bytes());
        put_str(
            &mut buf,
            &self.requested_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );
        put_str(&mut buf, &self.valid_until.to_string());
        buf.push(u8::from(self.approved));
        put_str(&mut buf, &self.title);
        put_str(&mut buf, &self.description);
        buf
    }
}

/// Length-prefixed string.
pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

// ---------------------------------------------------------------------------
// StateRef / StateAndRef
// ---------------------------------------------------------------------------

/// Pointer to output `index` of transaction `txhash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: String,
    pub index: u32,
}

impl StateRef {
    pub fn new(txhash: impl Into<String>, index: u32) -> Self {
        Self {
            txhash: txhash.into(),
            index,
        }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

/// A state together with where it lives on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: TransferState,
    pub reference: StateRef,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
