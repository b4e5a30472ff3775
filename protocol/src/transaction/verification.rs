//! Contract verification: is a proposed transaction a legal transition?
//!
//! [`verify`] is pure. It looks only at the transaction and the instant it
//! is given, never at a vault or the network, so every party can run it
//! independently and reach the same verdict.
//!
//! Verification happens in two stages. [`Transition::classify`] checks the
//! command count and the input/output shape required by the command, and
//! produces a [`Transition`]. The per-kind rules then run in a fixed order;
//! the first rule that fails is reported.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

use super::builder::WireTransaction;
use super::types::{StateAndRef, TransferCommand, TransferState};
use crate::crypto::keys::RemitPublicKey;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A violated contract rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("expected exactly one command, got {got}")]
    ExpectedOneCommand { got: usize },

    #[error("{command} expects {expected} input(s), got {got}")]
    WrongInputCount {
        command: TransferCommand,
        expected: usize,
        got: usize,
    },

    #[error("{command} expects {expected} output(s), got {got}")]
    WrongOutputCount {
        command: TransferCommand,
        expected: usize,
        got: usize,
    },

    #[error("required signer {key} not present in the command")]
    SignerMissing { key: RemitPublicKey },

    #[error("command must have exactly {expected} distinct signer(s), got {got}")]
    WrongSignerCount { expected: usize, got: usize },

    #[error("time window not valid")]
    InvalidTimeWindow,

    #[error("requester cannot approve this transfer on their own")]
    RequestAlreadyApproved,

    #[error("invalid request value: {amount}")]
    NonPositiveRequest { amount: i64 },

    #[error("title/description cannot be empty")]
    EmptyMetadata,

    #[error("title does not match")]
    TitleMismatch,

    #[error("description does not match")]
    DescriptionMismatch,

    #[error("request time changed or approved state still expires")]
    TimestampMismatch,

    #[error("issuer does not match")]
    IssuerMismatch,

    #[error("requester does not match")]
    RequesterMismatch,

    #[error("cannot approve more than requested")]
    ApprovesMoreThanRequested { requested: i64, approved: i64 },

    #[error("cannot approve non-positive value: {amount}")]
    NonPositiveApproval { amount: i64 },

    #[error("observers must remain the same")]
    ObserversChanged,

    #[error("approval flags invalid")]
    InvalidApprovalFlags,

    #[error("time window not valid, decline the request instead")]
    RequestExpired,

    #[error("cannot decline an approved request")]
    DeclineApproved,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A shape-checked transaction, one variant per command.
#[derive(Debug, Clone, Copy)]
pub enum Transition<'a> {
    Request {
        output: &'a TransferState,
        signers: &'a [RemitPublicKey],
    },
    Approve {
        input: &'a StateAndRef,
        output: &'a TransferState,
        signers: &'a [RemitPublicKey],
    },
    Decline {
        input: &'a StateAndRef,
        signers: &'a [RemitPublicKey],
    },
}

impl<'a> Transition<'a> {
    /// Checks the command count and the input/output counts the command
    /// requires.
    pub fn classify(tx: &'a WireTransaction) -> Result<Self, ContractError> {
        let [command] = tx.commands.as_slice() else {
            return Err(ContractError::ExpectedOneCommand {
                got: tx.commands.len(),
            });
        };
        let kind = command.value;
        let (want_inputs, want_outputs) = match kind {
            TransferCommand::Request => (0, 1),
            TransferCommand::Approve => (1, 1),
            TransferCommand::Decline => (1, 0),
        };
        if tx.inputs.len() != want_inputs {
            return Err(ContractError::WrongInputCount {
                command: kind,
                expected: want_inputs,
                got: tx.inputs.len(),
            });
        }
        if tx.outputs.len() != want_outputs {
            return Err(ContractError::WrongOutputCount {
                command: kind,
                expected: want_outputs,
                got: tx.outputs.len(),
            });
        }

        let signers = command.signers.as_slice();
        Ok(match kind {
            TransferCommand::Request => Self::Request {
                output: &tx.outputs[0],
                signers,
            },
            TransferCommand::Approve => Self::Approve {
                input: &tx.inputs[0],
                output: &tx.outputs[0],
                signers,
            },
            TransferCommand::Decline => Self::Decline {
                input: &tx.inputs[0],
                signers,
            },
        })
    }

    pub fn command(&self) -> TransferCommand {
        match self {
            Self::Request { .. } => TransferCommand::Request,
            Self::Approve { .. } => TransferCommand::Approve,
            Self::Decline { .. } => TransferCommand::Decline,
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies `tx` against the transfer contract as of `now`.
pub fn verify(tx: &WireTransaction, now: DateTime<Utc>) -> Result<(), ContractError> {
    match Transition::classify(tx)? {
        Transition::Request { output, signers } => verify_request(output, signers, now),
        Transition::Approve {
            input,
            output,
            signers,
        } => verify_approve(&input.state, output, signers, now),
        Transition::Decline { input, signers } => verify_decline(&input.state, signers),
    }
}

/// [`verify`] with `now` taken from the system clock.
pub fn verify_transaction(tx: &WireTransaction) -> Result<(), ContractError> {
    verify(tx, Utc::now())
}

/// The signer set must be exactly `required`. Duplicates collapse.
fn check_signers(
    signers: &[RemitPublicKey],
    required: &[&RemitPublicKey],
) -> Result<(), ContractError> {
    let present: BTreeSet<&RemitPublicKey> = signers.iter().collect();
    for key in required {
        if !present.contains(key) {
            return Err(ContractError::SignerMissing { key: **key });
        }
    }
    let expected: BTreeSet<&RemitPublicKey> = required.iter().copied().collect();
    if present.len() != expected.len() {
        return Err(ContractError::WrongSignerCount {
            expected: expected.len(),
            got: present.len(),
        });
    }
    Ok(())
}

fn within_window(state: &TransferState, now: DateTime<Utc>) -> bool {
    state.valid_until.is_after(now) && state.requested_at < now
}

fn verify_request(
    output: &TransferState,
    signers: &[RemitPublicKey],
    now: DateTime<Utc>,
) -> Result<(), ContractError> {
    check_signers(
        signers,
        &[output.issuer.owning_key(), output.requester.owning_key()],
    )?;
    if !within_window(output, now) {
        return Err(ContractError::InvalidTimeWindow);
    }
    if output.approved {
        return Err(ContractError::RequestAlreadyApproved);
    }
    if output.amount <= 0 {
        return Err(ContractError::NonPositiveRequest {
            amount: output.amount,
        });
    }
    if output.title.is_empty() || output.description.is_empty() {
        return Err(ContractError::EmptyMetadata);
    }
    Ok(())
}

fn verify_approve(
    input: &TransferState,
    output: &TransferState,
    signers: &[RemitPublicKey],
    now: DateTime<Utc>,
) -> Result<(), ContractError> {
    check_signers(
        signers,
        &[output.issuer.owning_key(), output.requester.owning_key()],
    )?;
    if input.title != output.title {
        return Err(ContractError::TitleMismatch);
    }
    if input.description != output.description {
        return Err(ContractError::DescriptionMismatch);
    }
    if input.requested_at != output.requested_at || !output.valid_until.is_infinite() {
        return Err(ContractError::TimestampMismatch);
    }
    if input.issuer != output.issuer {
        return Err(ContractError::IssuerMismatch);
    }
    if input.requester != output.requester {
        return Err(ContractError::RequesterMismatch);
    }
    if output.amount > input.amount {
        return Err(ContractError::ApprovesMoreThanRequested {
            requested: input.amount,
            approved: output.amount,
        });
    }
    if output.amount <= 0 {
        return Err(ContractError::NonPositiveApproval {
            amount: output.amount,
        });
    }
    if !input.same_observers(output) {
        return Err(ContractError::ObserversChanged);
    }
    if input.approved || !output.approved {
        return Err(ContractError::InvalidApprovalFlags);
    }
    if !within_window(input, now) {
        return Err(ContractError::RequestExpired);
    }
    Ok(())
}

fn verify_decline(input: &TransferState, signers: &[RemitPublicKey]) -> Result<(), ContractError> {
    check_signers(signers, &[input.issuer.owning_key()])?;
    if input.approved {
        return Err(ContractError::DeclineApproved);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
