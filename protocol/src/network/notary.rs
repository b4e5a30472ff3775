//! Uniqueness oracle.
//!
//! The notary is the only place where two flows racing for the same input
//! are ordered. It claims every input of a transaction atomically: either
//! all of them were unspent and are now marked spent by this transaction,
//! or none are claimed and the caller learns which ones were taken.
//!
//! It also remembers every output it has committed, and only accepts an
//! input whose content is exactly the output committed at its reference.
//! A transaction cannot consume a state by describing it differently.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::keys::RemitKeypair;
use crate::identity::Party;
use crate::transaction::{
    SignedTransaction, StateRef, TransactionError, TransactionSignature, TransferState,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotaryError {
    #[error("{} input(s) already consumed", .consumed.len())]
    Conflict { consumed: Vec<StateRef> },

    #[error("transaction names notary {named}, this is {actual}")]
    WrongNotary { named: String, actual: String },

    #[error("transaction rejected by notary: {0}")]
    InvalidTransaction(#[from] TransactionError),
}

/// Commits transactions against double spends.
#[async_trait]
pub trait UniquenessProvider: Send + Sync {
    /// The notary's ledger identity.
    fn identity(&self) -> &Party;

    /// Claims all inputs of `stx` and returns the notary's signature, or
    /// fails with the already-consumed references. Never claims a subset.
    async fn commit(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError>;
}

#[derive(Default)]
struct Ledger {
    /// Spent input reference → id of the transaction that spent it.
    spent: HashMap<StateRef, String>,
    /// Committed outputs not yet spent.
    unspent: HashMap<StateRef, TransferState>,
}

/// Single-process notary holding its ledger in memory.
pub struct InMemoryNotary {
    identity: Party,
    keypair: RemitKeypair,
    ledger: Mutex<Ledger>,
}

impl InMemoryNotary {
    pub fn new(name: impl Into<String>, keypair: RemitKeypair) -> Self {
        Self {
            identity: Party::new(name, keypair.public_key()),
            keypair,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// The transaction that consumed `reference`, if any.
    pub fn consumed_by(&self, reference: &StateRef) -> Option<String> {
        self.ledger.lock().spent.get(reference).cloned()
    }

    pub fn spent_count(&self) -> usize {
        self.ledger.lock().spent.len()
    }
}

#[async_trait]
impl UniquenessProvider for InMemoryNotary {
    fn identity(&self) -> &Party {
        &self.identity
    }

    async fn commit(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        if stx.tx.notary != self.identity {
            return Err(NotaryError::WrongNotary {
                named: stx.tx.notary.to_string(),
                actual: self.identity.to_string(),
            });
        }
        stx.verify_signatures_except(&[*self.identity.owning_key()])?;

        {
            let mut ledger = self.ledger.lock();
            let consumed: Vec<StateRef> = stx
                .tx
                .inputs
                .iter()
                .filter(|i| ledger.spent.contains_key(&i.reference))
                .map(|i| i.reference.clone())
                .collect();
            if !consumed.is_empty() {
                warn!(tx = %stx.id(), conflicts = consumed.len(), "double spend rejected");
                return Err(NotaryError::Conflict { consumed });
            }

            for input in &stx.tx.inputs {
                let reference = input.reference.clone();
                match ledger.unspent.get(&input.reference) {
                    None => {
                        warn!(tx = %stx.id(), input = %reference, "unknown input rejected");
                        return Err(TransactionError::UnresolvedInput { reference }.into());
                    }
                    Some(committed) if *committed != input.state => {
                        warn!(tx = %stx.id(), input = %reference, "forged input rejected");
                        return Err(TransactionError::InputMismatch { reference }.into());
                    }
                    Some(_) => {}
                }
            }

            for reference in stx.tx.input_refs() {
                ledger.unspent.remove(&reference);
                ledger.spent.insert(reference, stx.id().to_string());
            }
            for output in stx.tx.output_states() {
                ledger.unspent.insert(output.reference, output.state);
            }
        }

        debug!(tx = %stx.id(), inputs = stx.tx.inputs.len(), "notarised");
        Ok(TransactionSignature::create(&self.keypair, stx.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{
        Command, StateAndRef, TransactionBuilder, TransferCommand, TransferState,
    };
    use chrono::{Duration, Utc};

    struct Keys {
        issuer: RemitKeypair,
        requester: RemitKeypair,
    }

    impl Keys {
        fn new() -> Self {
            Self {
                issuer: RemitKeypair::generate(),
                requester: RemitKeypair::generate(),
            }
        }

        fn issuer(&self) -> Party {
            Party::new("Issuer", self.issuer.public_key())
        }

        fn requester(&self) -> Party {
            Party::new("Requester", self.requester.public_key())
        }
    }

    /// Commits a pending request and returns its output.
    async fn issue(notary: &InMemoryNotary, keys: &Keys) -> StateAndRef {
        let now = Utc::now();
        let state = TransferState::new_request(
            keys.issuer(),
            keys.requester(),
            vec![keys.issuer(), keys.requester()],
            5,
            now,
            now + Duration::days(1),
            "t",
            "d",
        );
        let tx = TransactionBuilder::new(notary.identity().clone())
            .add_output(state)
            .add_command(Command::new(
                TransferCommand::Request,
                vec![keys.issuer.public_key(), keys.requester.public_key()],
            ))
            .build();
        let stx = SignedTransaction::signed_by(tx, &keys.issuer);
        let stx = stx.with_additional_signature(TransactionSignature::create(
            &keys.requester,
            stx.id(),
        ));
        notary.commit(&stx).await.unwrap();
        stx.tx.output_states().remove(0)
    }

    fn decline(notary: &Party, keys: &Keys, input: StateAndRef) -> SignedTransaction {
        let tx = TransactionBuilder::new(notary.clone())
            .add_input(input)
            .add_command(Command::new(
                TransferCommand::Decline,
                vec![keys.issuer.public_key()],
            ))
            .build();
        SignedTransaction::signed_by(tx, &keys.issuer)
    }

    #[tokio::test]
    async fn first_spend_wins() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let pending = issue(&notary, &keys).await;
        let reference = pending.reference.clone();

        let first = decline(notary.identity(), &keys, pending.clone());
        let sig = notary.commit(&first).await.unwrap();
        assert!(sig.is_valid_for(first.id()));
        assert_eq!(notary.consumed_by(&reference), Some(first.id().to_string()));

        let second = decline(notary.identity(), &keys, pending);
        assert_eq!(
            notary.commit(&second).await,
            Err(NotaryError::Conflict {
                consumed: vec![reference]
            })
        );
    }

    #[tokio::test]
    async fn resubmission_conflicts() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let pending = issue(&notary, &keys).await;
        let stx = decline(notary.identity(), &keys, pending);
        notary.commit(&stx).await.unwrap();
        assert!(matches!(
            notary.commit(&stx).await,
            Err(NotaryError::Conflict { .. })
        ));
        assert_eq!(notary.spent_count(), 1);
    }

    #[tokio::test]
    async fn unknown_input_rejected() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let mut pending = issue(&notary, &keys).await;
        pending.reference = StateRef::new("aa", 0);

        let stx = decline(notary.identity(), &keys, pending);
        assert_eq!(
            notary.commit(&stx).await,
            Err(NotaryError::InvalidTransaction(
                TransactionError::UnresolvedInput {
                    reference: StateRef::new("aa", 0)
                }
            ))
        );
        assert_eq!(notary.spent_count(), 0);
    }

    #[tokio::test]
    async fn misdescribed_input_rejected() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let mut pending = issue(&notary, &keys).await;
        let reference = pending.reference.clone();
        pending.state.amount = 500;

        let stx = decline(notary.identity(), &keys, pending);
        assert_eq!(
            notary.commit(&stx).await,
            Err(NotaryError::InvalidTransaction(
                TransactionError::InputMismatch { reference: reference.clone() }
            ))
        );
        assert_eq!(notary.consumed_by(&reference), None);
    }

    #[tokio::test]
    async fn wrong_notary_rejected() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let pending = issue(&notary, &keys).await;
        let other = Party::new("Other", RemitKeypair::generate().public_key());
        let stx = decline(&other, &keys, pending);
        assert!(matches!(
            notary.commit(&stx).await,
            Err(NotaryError::WrongNotary { .. })
        ));
        assert_eq!(notary.spent_count(), 0);
    }

    #[tokio::test]
    async fn unsigned_transaction_rejected() {
        let notary = InMemoryNotary::new("Notary", RemitKeypair::generate());
        let keys = Keys::new();
        let pending = issue(&notary, &keys).await;
        let mut stx = decline(notary.identity(), &keys, pending);
        stx.sigs.clear();
        assert!(matches!(
            notary.commit(&stx).await,
            Err(NotaryError::InvalidTransaction(
                TransactionError::MissingSignatures { .. }
            ))
        ));
    }
}
