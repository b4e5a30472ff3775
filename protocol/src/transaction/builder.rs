//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] assembles inputs, outputs, commands and the
//! notary, draws a random privacy salt, and returns a [`WireTransaction`]
//! whose id is derived from its contents.
//!
//! The builder does not sign; that happens in [`super::signing`].

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::types::{put_str, Command, StateAndRef, StateRef, TransferState};
use crate::crypto::hash::blake3_hash;
use crate::identity::Party;

// ---------------------------------------------------------------------------
// WireTransaction
// ---------------------------------------------------------------------------

/// An unsigned proposed ledger transition.
///
/// `id` is `hex(BLAKE3(canonical_bytes))` and every signature on the
/// transaction is made over the id bytes. Inputs carry their resolved states
/// so that verification needs no ledger lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub id: String,
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<TransferState>,
    pub commands: Vec<Command>,
    pub notary: Party,
    /// Random bytes so that two otherwise identical transactions get
    /// different ids.
    pub privacy_salt: [u8; 32],
}

impl WireTransaction {
    /// Deterministic serialization of every field except `id`.
    ///
    /// Strings are length-prefixed, integers little-endian, and each section
    /// starts with a one-byte tag followed by its element count.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1024);

        buf.push(b'I');
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            put_str(&mut buf, &input.reference.txhash);
            buf.extend_from_slice(&input.reference.index.to_le_bytes());
            buf.extend_from_slice(&input.state.canonical_bytes());
        }

        buf.push(b'O');
        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.canonical_bytes());
        }

        buf.push(b'C');
        buf.extend_from_slice(&(self.commands.len() as u32).to_le_bytes());
        for command in &self.commands {
            buf.extend_from_slice(&command.canonical_bytes());
        }

        buf.push(b'N');
        buf.extend_from_slice(&self.notary.canonical_bytes());

        buf.push(b'S');
        buf.extend_from_slice(&self.privacy_salt);

        buf
    }

    /// Recomputes the id from the current field values.
    pub fn compute_id(&self) -> String {
        hex::encode(blake3_hash(&self.canonical_bytes()))
    }

    /// The reference output `index` will have once this transaction is
    /// recorded.
    pub fn output_ref(&self, index: u32) -> StateRef {
        StateRef::new(self.id.clone(), index)
    }

    /// Outputs paired with their future references.
    pub fn output_states(&self) -> Vec<StateAndRef> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, state)| StateAndRef {
                state: state.clone(),
                reference: self.output_ref(i as u32),
            })
            .collect()
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.reference.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`WireTransaction`].
///
/// ```rust,no_run
/// use remit_protocol::transaction::{Command, TransactionBuilder, TransferCommand};
/// # fn demo(notary: remit_protocol::identity::Party,
/// #         state: remit_protocol::transaction::TransferState,
/// #         signers: Vec<remit_protocol::crypto::RemitPublicKey>) {
/// let tx = TransactionBuilder::new(notary)
///     .add_output(state)
///     .add_command(Command::new(TransferCommand::Request, signers))
///     .build();
/// # }
/// ```
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRef>,
    outputs: Vec<TransferState>,
    commands: Vec<Command>,
    privacy_salt: Option<[u8; 32]>,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            privacy_salt: None,
        }
    }

    pub fn add_input(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output(mut self, output: TransferState) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn add_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Fixes the privacy salt. Only needed for reproducible ids in tests.
    pub fn privacy_salt(mut self, salt: [u8; 32]) -> Self {
        self.privacy_salt = Some(salt);
        self
    }

    /// Consumes the builder and produces the unsigned transaction.
    pub fn build(self) -> WireTransaction {
        let privacy_salt = self.privacy_salt.unwrap_or_else(|| {
            let mut salt = [0u8; 32];
            OsRng.fill_bytes(&mut salt);
            salt
        });

        let mut tx = WireTransaction {
            id: String::new(),
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            notary: self.notary,
            privacy_salt,
        };
        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::RemitKeypair;
    use crate::transaction::types::TransferCommand;
    use chrono::{Duration, TimeZone, Utc};

    fn party(seed: u8, name: &str) -> Party {
        Party::new(name, RemitKeypair::from_seed(&[seed; 32]).public_key())
    }

    fn sample(salt: [u8; 32]) -> WireTransaction {
        let issuer = party(1, "Issuer");
        let requester = party(2, "Requester");
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let state = TransferState::new_request(
            issuer.clone(),
            requester.clone(),
            vec![issuer.clone(), requester.clone()],
            1000,
            now,
            now + Duration::days(30),
            "t",
            "d",
        );
        TransactionBuilder::new(party(9, "Notary"))
            .add_output(state)
            .add_command(Command::new(
                TransferCommand::Request,
                vec![*issuer.owning_key(), *requester.owning_key()],
            ))
            .privacy_salt(salt)
            .build()
    }

    #[test]
    fn builder_produces_deterministic_id() {
        let a = sample([7u8; 32]);
        let b = sample([7u8; 32]);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
        assert_eq!(a.id, a.compute_id());
    }

    #[test]
    fn salt_changes_id() {
        assert_ne!(sample([7u8; 32]).id, sample([8u8; 32]).id);
    }

    #[test]
    fn random_salt_is_drawn_when_unset() {
        let issuer = party(1, "Issuer");
        let a = TransactionBuilder::new(issuer.clone()).build();
        let b = TransactionBuilder::new(issuer).build();
        assert_ne!(a.privacy_salt, b.privacy_salt);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn output_refs_point_into_this_transaction() {
        let tx = sample([0u8; 32]);
        let outs = tx.output_states();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].reference, StateRef::new(tx.id.clone(), 0));
    }

    #[test]
    fn tampering_breaks_id() {
        let mut tx = sample([0u8; 32]);
        tx.outputs[0].amount = 1;
        assert_ne!(tx.id, tx.compute_id());
    }
}
