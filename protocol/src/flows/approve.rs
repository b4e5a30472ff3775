//! Approve: the issuer approves a pending request, possibly for less.
//!
//! The approved version keeps the request's uid, never expires, and is
//! shared with every observer. The requester is asked to countersign; the
//! other observers only receive the finalized transaction.

use chrono::Utc;
use tracing::info;

use super::context::FlowContext;
use super::error::FlowError;
use super::finality::{collect_signature, finalize, notarise, receive_finality, sign_proposal};
use super::progress::ProgressStep;
use super::{finish, locate_pending};
use crate::identity::Party;
use crate::network::{FlowSession, SessionMessage};
use crate::transaction::{verify, Command, SignedTransaction, TransactionBuilder, TransferCommand};

/// Initiator of an approval. Run by the issuer.
#[derive(Debug, Clone)]
pub struct ApproveFlow {
    /// Leading characters of the request uid.
    pub uid_prefix: String,
    /// Amount granted. At most the amount requested.
    pub amount: i64,
}

impl ApproveFlow {
    pub fn new(uid_prefix: impl Into<String>, amount: i64) -> Self {
        Self {
            uid_prefix: uid_prefix.into(),
            amount,
        }
    }

    pub async fn call(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        info!(
            run = %ctx.progress().run_id(),
            me = %ctx.me(),
            prefix = %self.uid_prefix,
            amount = self.amount,
            "approve flow started"
        );
        let result = self.run(ctx).await;
        finish(ctx, result)
    }

    async fn run(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        let input = locate_pending(ctx, &self.uid_prefix)?;
        let requester = input.state.requester.clone();

        ctx.progress().set(ProgressStep::Building);
        let output = input.state.approved_for(self.amount);
        let observers: Vec<Party> = output
            .observers
            .iter()
            .filter(|p| *p != ctx.me() && **p != requester)
            .cloned()
            .collect();
        let signers = vec![*ctx.me().owning_key(), *requester.owning_key()];
        let tx = TransactionBuilder::new(ctx.notary_identity().clone())
            .add_input(input)
            .add_output(output)
            .add_command(Command::new(TransferCommand::Approve, signers))
            .build();

        ctx.progress().set(ProgressStep::Verifying);
        verify(&tx, Utc::now())?;

        ctx.progress().set(ProgressStep::Signing);
        let stx = SignedTransaction::signed_by(tx, ctx.keypair());

        let mut requester_session = ctx.initiate(&requester, TransferCommand::Approve).await?;
        requester_session.send(SessionMessage::Solicit(true)).await?;
        let stx = collect_signature(ctx, &mut requester_session, stx).await?;

        // Observer sessions are opened before notarising so an unreachable
        // observer aborts the flow with nothing committed.
        let mut sessions = vec![requester_session];
        for observer in &observers {
            let session = ctx.initiate(observer, TransferCommand::Approve).await?;
            session.send(SessionMessage::Solicit(false)).await?;
            sessions.push(session);
        }

        let stx = notarise(ctx, stx).await?;
        finalize(ctx, stx, sessions).await
    }
}

/// Rules the requester applies before countersigning an approval.
///
/// The approved state must name this node as requester and the session
/// counterparty as issuer, and must not be expired.
pub fn check_approve_proposal(
    me: &Party,
    stx: &SignedTransaction,
    counterparty: &Party,
) -> Result<(), String> {
    let output = stx
        .tx
        .outputs
        .first()
        .ok_or_else(|| "approval has no output".to_string())?;
    if !output.approved {
        return Err("approval output is not approved".into());
    }
    if output.requester != *me {
        return Err(format!("approval is for {}, not {}", output.requester, me));
    }
    if output.issuer != *counterparty {
        return Err(format!(
            "approval must come from issuer {}, not {}",
            output.issuer, counterparty
        ));
    }
    if output.valid_until.is_before(Utc::now()) {
        return Err("approval has expired".into());
    }
    Ok(())
}

/// Requester and observer side of [`ApproveFlow`].
pub async fn approve_responder(
    ctx: &FlowContext,
    mut session: FlowSession,
) -> Result<(), FlowError> {
    let mut signed = None;
    if session.receive_solicit().await? {
        let me = ctx.me().clone();
        signed = sign_proposal(ctx, &mut session, TransferCommand::Approve, |stx, from| {
            check_approve_proposal(&me, stx, from)
        })
        .await?;
        if signed.is_none() {
            return Ok(());
        }
    }
    receive_finality(ctx, &mut session, signed.as_deref()).await?;
    Ok(())
}
