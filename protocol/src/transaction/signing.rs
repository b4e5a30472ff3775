//! Signed transactions and their signature checks.
//!
//! A [`SignedTransaction`] is a [`WireTransaction`] plus the signatures
//! collected so far. Signatures are made over the UTF-8 bytes of the
//! transaction id, so adding one never changes what the others cover.
//!
//! The keys that must eventually sign are the union of all command signers
//! and the notary's key. During signature collection a party checks the
//! signatures present with [`SignedTransaction::verify_signatures_except`],
//! naming the keys it expects to still be missing; at finality every
//! required key must have signed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::builder::WireTransaction;
use super::types::StateRef;
use crate::crypto::keys::{RemitKeypair, RemitPublicKey, RemitSignature};

/// Why a signed transaction failed its signature or input checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction id mismatch: carried {carried}, computed {computed}")]
    IdMismatch { carried: String, computed: String },

    #[error("invalid signature by {signer}")]
    InvalidSignature { signer: RemitPublicKey },

    #[error("signature by {signer} is not required by this transaction")]
    UnexpectedSigner { signer: RemitPublicKey },

    #[error("missing signatures from {} required key(s)", .missing.len())]
    MissingSignatures { missing: Vec<RemitPublicKey> },

    #[error("input {reference} does not resolve to a recorded output")]
    UnresolvedInput { reference: StateRef },

    #[error("input {reference} does not match the recorded output")]
    InputMismatch { reference: StateRef },
}

// ---------------------------------------------------------------------------
// TransactionSignature
// ---------------------------------------------------------------------------

/// One party's signature over a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: RemitPublicKey,
    pub signature: RemitSignature,
}

impl TransactionSignature {
    /// Signs the transaction with id `tx_id`.
    pub fn create(keypair: &RemitKeypair, tx_id: &str) -> Self {
        Self {
            by: keypair.public_key(),
            signature: keypair.sign(tx_id.as_bytes()),
        }
    }

    pub fn is_valid_for(&self, tx_id: &str) -> bool {
        self.by.verify(tx_id.as_bytes(), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// Wraps a transaction with no signatures yet.
    pub fn new(tx: WireTransaction) -> Self {
        Self {
            tx,
            sigs: Vec::new(),
        }
    }

    /// Wraps a transaction and signs it with `keypair`.
    pub fn signed_by(tx: WireTransaction, keypair: &RemitKeypair) -> Self {
        let sig = TransactionSignature::create(keypair, &tx.id);
        Self { tx, sigs: vec![sig] }
    }

    pub fn id(&self) -> &str {
        &self.tx.id
    }

    /// Command signers plus the notary.
    pub fn required_signing_keys(&self) -> BTreeSet<RemitPublicKey> {
        let mut keys: BTreeSet<RemitPublicKey> = self
            .tx
            .commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect();
        keys.insert(*self.tx.notary.owning_key());
        keys
    }

    /// Required keys with no signature attached yet. Validity of the
    /// attached signatures is not checked here.
    pub fn missing_signers(&self) -> BTreeSet<RemitPublicKey> {
        let present: BTreeSet<&RemitPublicKey> = self.sigs.iter().map(|s| &s.by).collect();
        self.required_signing_keys()
            .into_iter()
            .filter(|k| !present.contains(k))
            .collect()
    }

    /// Checks the id against the content, every attached signature, and that
    /// the only required keys without a signature are in `allowed_missing`.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &[RemitPublicKey],
    ) -> Result<(), TransactionError> {
        let computed = self.tx.compute_id();
        if computed != self.tx.id {
            return Err(TransactionError::IdMismatch {
                carried: self.tx.id.clone(),
                computed,
            });
        }

        let required = self.required_signing_keys();
        for sig in &self.sigs {
            if !required.contains(&sig.by) {
                return Err(TransactionError::UnexpectedSigner { signer: sig.by });
            }
            if !sig.is_valid_for(&self.tx.id) {
                return Err(TransactionError::InvalidSignature { signer: sig.by });
            }
        }

        let missing: Vec<RemitPublicKey> = self
            .missing_signers()
            .into_iter()
            .filter(|k| !allowed_missing.contains(k))
            .collect();
        if !missing.is_empty() {
            return Err(TransactionError::MissingSignatures { missing });
        }
        Ok(())
    }

    /// Every required key, notary included, has a valid signature.
    pub fn verify_required_signatures(&self) -> Result<(), TransactionError> {
        self.verify_signatures_except(&[])
    }

    /// Returns a copy with `sig` attached. A second signature by the same
    /// key replaces the first.
    pub fn with_additional_signature(&self, sig: TransactionSignature) -> Self {
        let mut sigs: Vec<TransactionSignature> =
            self.sigs.iter().filter(|s| s.by != sig.by).cloned().collect();
        sigs.push(sig);
        Self {
            tx: self.tx.clone(),
            sigs,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
