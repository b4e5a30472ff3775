//! Per-party ledger store.
//!
//! A vault keeps every transaction its owner has recorded and the subset of
//! output states that are still unconsumed and concern the owner. Flows find
//! the request they act on by querying the unconsumed set.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::identity::Party;
use crate::transaction::{SignedTransaction, StateAndRef, StateRef, TransferState};

/// Ledger store consumed by flows.
pub trait VaultService: Send + Sync {
    /// Unconsumed states matching `predicate`, in reference order.
    fn query_unconsumed(&self, predicate: &dyn Fn(&TransferState) -> bool) -> Vec<StateAndRef>;

    /// Stores a finalized transaction: its inputs become consumed and the
    /// outputs the owner participates in become unconsumed. Recording the
    /// same transaction twice has no further effect.
    fn record_transaction(&self, stx: &SignedTransaction);

    /// A previously recorded transaction.
    fn transaction(&self, id: &str) -> Option<SignedTransaction>;

    fn unconsumed(&self) -> Vec<StateAndRef> {
        self.query_unconsumed(&|_: &TransferState| true)
    }

    /// The output recorded at `reference`, consumed or not. `None` when this
    /// vault never recorded the transaction that created it.
    fn resolve(&self, reference: &StateRef) -> Option<TransferState> {
        self.transaction(&reference.txhash)?
            .tx
            .outputs
            .get(reference.index as usize)
            .cloned()
    }
}

#[derive(Default)]
struct VaultInner {
    transactions: HashMap<String, SignedTransaction>,
    unconsumed: BTreeMap<StateRef, TransferState>,
}

/// [`VaultService`] backed by in-process maps.
pub struct InMemoryVault {
    owner: Party,
    inner: RwLock<VaultInner>,
}

impl InMemoryVault {
    pub fn new(owner: Party) -> Self {
        Self {
            owner,
            inner: RwLock::new(VaultInner::default()),
        }
    }

    pub fn owner(&self) -> &Party {
        &self.owner
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }
}

impl VaultService for InMemoryVault {
    fn query_unconsumed(&self, predicate: &dyn Fn(&TransferState) -> bool) -> Vec<StateAndRef> {
        self.inner
            .read()
            .unconsumed
            .iter()
            .filter(|(_, state)| predicate(state))
            .map(|(reference, state)| StateAndRef {
                state: state.clone(),
                reference: reference.clone(),
            })
            .collect()
    }

    fn record_transaction(&self, stx: &SignedTransaction) {
        let mut inner = self.inner.write();
        if inner.transactions.contains_key(stx.id()) {
            debug!(owner = %self.owner, tx = %stx.id(), "transaction already recorded");
            return;
        }

        for input in &stx.tx.inputs {
            inner.unconsumed.remove(&input.reference);
        }
        let mut kept = 0usize;
        for output in stx.tx.output_states() {
            if output.state.participants().contains(&self.owner) {
                inner.unconsumed.insert(output.reference, output.state);
                kept += 1;
            }
        }
        inner.transactions.insert(stx.id().to_string(), stx.clone());

        debug!(
            owner = %self.owner,
            tx = %stx.id(),
            consumed = stx.tx.inputs.len(),
            kept,
            "recorded transaction"
        );
    }

    fn transaction(&self, id: &str) -> Option<SignedTransaction> {
        self.inner.read().transactions.get(id).cloned()
    }
}
