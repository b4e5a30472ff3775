//! Request: the requester asks an issuer for funds.
//!
//! The requester builds a pending [`TransferState`] naming every node on the
//! network as an observer, signs it, and asks the issuer to countersign.
//! Only issuer and requester record the pending request; observers learn
//! about it once it is approved.

use chrono::Utc;
use tracing::info;

use super::context::FlowContext;
use super::error::FlowError;
use super::finality::{collect_signature, finalize, notarise, receive_finality, sign_proposal};
use super::progress::ProgressStep;
use super::finish;
use crate::identity::Party;
use crate::network::{FlowSession, SessionMessage};
use crate::transaction::{
    verify, Command, SignedTransaction, TransactionBuilder, TransferCommand, TransferState,
};

/// Initiator of a new transfer request.
#[derive(Debug, Clone)]
pub struct RequestFlow {
    pub issuer: Party,
    pub title: String,
    pub description: String,
    pub amount: i64,
}

impl RequestFlow {
    pub fn new(
        issuer: Party,
        title: impl Into<String>,
        description: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            issuer,
            title: title.into(),
            description: description.into(),
            amount,
        }
    }

    pub async fn call(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        info!(
            run = %ctx.progress().run_id(),
            me = %ctx.me(),
            issuer = %self.issuer,
            amount = self.amount,
            "request flow started"
        );
        let result = self.run(ctx).await;
        finish(ctx, result)
    }

    async fn run(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        ctx.progress().set(ProgressStep::Building);
        let now = Utc::now();
        let validity = ctx.config().request_validity;
        let valid_until = now
            .checked_add_signed(validity)
            .ok_or(FlowError::ValidityOutOfRange {
                seconds: validity.num_seconds(),
            })?;
        let state = TransferState::new_request(
            self.issuer.clone(),
            ctx.me().clone(),
            ctx.parties().to_vec(),
            self.amount,
            now,
            valid_until,
            self.title,
            self.description,
        );
        let signers = vec![*self.issuer.owning_key(), *ctx.me().owning_key()];
        let tx = TransactionBuilder::new(ctx.notary_identity().clone())
            .add_output(state)
            .add_command(Command::new(TransferCommand::Request, signers))
            .build();

        ctx.progress().set(ProgressStep::Verifying);
        verify(&tx, Utc::now())?;

        ctx.progress().set(ProgressStep::Signing);
        let stx = SignedTransaction::signed_by(tx, ctx.keypair());

        let mut session = ctx.initiate(&self.issuer, TransferCommand::Request).await?;
        session.send(SessionMessage::Solicit(true)).await?;
        let stx = collect_signature(ctx, &mut session, stx).await?;

        let stx = notarise(ctx, stx).await?;
        finalize(ctx, stx, vec![session]).await
    }
}

/// Rules the issuer applies before countersigning a request.
pub fn check_request_proposal(
    me: &Party,
    stx: &SignedTransaction,
    _counterparty: &Party,
) -> Result<(), String> {
    let output = stx
        .tx
        .outputs
        .first()
        .ok_or_else(|| "request has no output".to_string())?;
    if output.approved {
        return Err("a new request cannot already be approved".into());
    }
    if output.issuer != *me {
        return Err(format!("request names {} as issuer, not {}", output.issuer, me));
    }
    Ok(())
}

/// Issuer side of [`RequestFlow`].
pub async fn request_responder(
    ctx: &FlowContext,
    mut session: FlowSession,
) -> Result<(), FlowError> {
    let mut signed = None;
    if session.receive_solicit().await? {
        let me = ctx.me().clone();
        signed = sign_proposal(ctx, &mut session, TransferCommand::Request, |stx, from| {
            check_request_proposal(&me, stx, from)
        })
        .await?;
        if signed.is_none() {
            return Ok(());
        }
    }
    receive_finality(ctx, &mut session, signed.as_deref()).await?;
    Ok(())
}
