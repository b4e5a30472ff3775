//! Signature collection, notarisation and finality, shared by all flows.
//!
//! Initiator side: [`collect_signature`] → [`notarise`] → [`finalize`].
//! Responder side: [`sign_proposal`] (only when solicited) →
//! [`receive_finality`].

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use super::context::FlowContext;
use super::error::FlowError;
use super::progress::ProgressStep;
use crate::identity::Party;
use crate::network::{FlowSession, SessionError, SessionMessage};
use crate::transaction::{verify, SignedTransaction, TransactionError, TransferCommand, Transition};

// ---------------------------------------------------------------------------
// Initiator
// ---------------------------------------------------------------------------

/// Sends `stx` to the session's counterparty and appends its signature.
pub async fn collect_signature(
    ctx: &FlowContext,
    session: &mut FlowSession,
    stx: SignedTransaction,
) -> Result<SignedTransaction, FlowError> {
    ctx.progress().set(ProgressStep::CollectingSignatures);
    session
        .send(SessionMessage::SignatureRequest(stx.clone()))
        .await?;

    match session.receive().await? {
        SessionMessage::SignatureResponse(sig) => {
            if sig.by != *session.counterparty().owning_key() || !sig.is_valid_for(stx.id()) {
                return Err(TransactionError::InvalidSignature { signer: sig.by }.into());
            }
            debug!(tx = %stx.id(), from = %session.counterparty(), "counterparty signed");
            Ok(stx.with_additional_signature(sig))
        }
        SessionMessage::Refused(reason) => {
            warn!(tx = %stx.id(), party = %session.counterparty(), %reason, "signature refused");
            Err(FlowError::AuthorizationRefused {
                party: session.counterparty().to_string(),
                reason,
            })
        }
        other => Err(session.unexpected("SignatureResponse", &other).into()),
    }
}

/// Submits `stx` to the notary and appends the notary signature.
pub async fn notarise(
    ctx: &FlowContext,
    stx: SignedTransaction,
) -> Result<SignedTransaction, FlowError> {
    ctx.progress().set(ProgressStep::Notarising);
    let sig = ctx.notary().commit(&stx).await?;
    Ok(stx.with_additional_signature(sig))
}

/// Records `stx` locally, then sends it to every session and waits for the
/// acknowledgements.
///
/// The transaction is already committed when this runs, so a counterparty
/// that fails to acknowledge is logged and does not fail the flow.
pub async fn finalize(
    ctx: &FlowContext,
    stx: SignedTransaction,
    sessions: Vec<FlowSession>,
) -> Result<SignedTransaction, FlowError> {
    ctx.progress().set(ProgressStep::Broadcasting);
    stx.verify_required_signatures()?;
    ctx.vault().record_transaction(&stx);

    let deliveries = sessions.into_iter().map(|mut session| {
        let stx = stx.clone();
        async move {
            let result = deliver(&mut session, stx).await;
            (session.counterparty().clone(), result)
        }
    });
    for (party, result) in join_all(deliveries).await {
        match result {
            Ok(()) => debug!(tx = %stx.id(), %party, "finality acknowledged"),
            Err(err) => warn!(tx = %stx.id(), %party, error = %err, "finality not acknowledged"),
        }
    }
    Ok(stx)
}

async fn deliver(session: &mut FlowSession, stx: SignedTransaction) -> Result<(), SessionError> {
    session.send(SessionMessage::Finalize(stx)).await?;
    session.receive_ack().await
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Receives a signature request and answers it.
///
/// The proposal must carry valid signatures from everyone except this node
/// and the notary, be a `expected` transaction, and pass the contract. Then
/// `check` runs the flow-specific rules. Returns the id of the transaction
/// signed, or `None` if it was refused.
pub async fn sign_proposal<F>(
    ctx: &FlowContext,
    session: &mut FlowSession,
    expected: TransferCommand,
    check: F,
) -> Result<Option<String>, FlowError>
where
    F: FnOnce(&SignedTransaction, &Party) -> Result<(), String>,
{
    let stx = session.receive_signature_request().await?;
    let verdict = check_proposal(ctx, &stx, expected)
        .and_then(|()| check(&stx, session.counterparty()));

    match verdict {
        Ok(()) => {
            ctx.progress().set(ProgressStep::Signing);
            session
                .send(SessionMessage::SignatureResponse(ctx.sign(stx.id())))
                .await?;
            debug!(tx = %stx.id(), to = %session.counterparty(), "signed proposal");
            Ok(Some(stx.id().to_string()))
        }
        Err(reason) => {
            warn!(tx = %stx.id(), from = %session.counterparty(), %reason, "refusing to sign");
            session.send(SessionMessage::Refused(reason)).await?;
            Ok(None)
        }
    }
}

fn check_proposal(
    ctx: &FlowContext,
    stx: &SignedTransaction,
    expected: TransferCommand,
) -> Result<(), String> {
    stx.verify_signatures_except(&[
        *ctx.me().owning_key(),
        *ctx.notary_identity().owning_key(),
    ])
    .map_err(|e| e.to_string())?;
    check_inputs(ctx, stx, true).map_err(|e| e.to_string())?;

    let command = Transition::classify(&stx.tx)
        .map_err(|e| e.to_string())?
        .command();
    if command != expected {
        return Err(format!("expected a {expected} transaction, got {command}"));
    }

    ctx.progress().set(ProgressStep::Verifying);
    verify(&stx.tx, Utc::now()).map_err(|e| e.to_string())
}

/// Matches every input against the output this node recorded at the same
/// reference.
///
/// An input from a transaction this node never recorded passes only when
/// `require_known` is false and the claimed state does not involve this
/// node. Such inputs have been matched by the notary.
fn check_inputs(
    ctx: &FlowContext,
    stx: &SignedTransaction,
    require_known: bool,
) -> Result<(), TransactionError> {
    for input in &stx.tx.inputs {
        let reference = input.reference.clone();
        match ctx.vault().resolve(&reference) {
            Some(recorded) if recorded == input.state => {}
            Some(_) => return Err(TransactionError::InputMismatch { reference }),
            None if require_known || input.state.participants().contains(ctx.me()) => {
                return Err(TransactionError::UnresolvedInput { reference })
            }
            None => {}
        }
    }
    Ok(())
}

/// Receives the finalized transaction, checks it and records it.
///
/// When this node signed a proposal in the same session, `expected_id`
/// pins the finalized transaction to the one it signed.
pub async fn receive_finality(
    ctx: &FlowContext,
    session: &mut FlowSession,
    expected_id: Option<&str>,
) -> Result<SignedTransaction, FlowError> {
    let stx = session.receive_finalize().await?;
    if let Some(expected) = expected_id {
        if stx.id() != expected {
            return Err(TransactionError::IdMismatch {
                carried: stx.id().to_string(),
                computed: expected.to_string(),
            }
            .into());
        }
    }
    stx.verify_required_signatures()?;
    check_inputs(ctx, &stx, false)?;
    verify(&stx.tx, Utc::now())?;

    ctx.progress().set(ProgressStep::Broadcasting);
    ctx.vault().record_transaction(&stx);
    session.send(SessionMessage::Ack).await?;
    debug!(tx = %stx.id(), from = %session.counterparty(), "recorded finalized transaction");
    Ok(stx)
}
