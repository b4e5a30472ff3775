//! Decline: the issuer refuses a pending request.
//!
//! The request is consumed with no successor. Only the issuer signs; the
//! requester is told the outcome.

use chrono::Utc;
use tracing::info;

use super::context::FlowContext;
use super::error::FlowError;
use super::finality::{finalize, notarise, receive_finality};
use super::progress::ProgressStep;
use super::{finish, locate_pending};
use crate::network::FlowSession;
use crate::transaction::{verify, Command, SignedTransaction, TransactionBuilder, TransferCommand};

/// Initiator of a decline. Run by the issuer.
#[derive(Debug, Clone)]
pub struct DeclineFlow {
    pub uid_prefix: String,
}

impl DeclineFlow {
    pub fn new(uid_prefix: impl Into<String>) -> Self {
        Self {
            uid_prefix: uid_prefix.into(),
        }
    }

    pub async fn call(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        info!(
            run = %ctx.progress().run_id(),
            me = %ctx.me(),
            prefix = %self.uid_prefix,
            "decline flow started"
        );
        let result = self.run(ctx).await;
        finish(ctx, result)
    }

    async fn run(self, ctx: &FlowContext) -> Result<SignedTransaction, FlowError> {
        let input = locate_pending(ctx, &self.uid_prefix)?;
        let requester = input.state.requester.clone();

        ctx.progress().set(ProgressStep::Building);
        let tx = TransactionBuilder::new(ctx.notary_identity().clone())
            .add_input(input)
            .add_command(Command::new(
                TransferCommand::Decline,
                vec![*ctx.me().owning_key()],
            ))
            .build();

        ctx.progress().set(ProgressStep::Verifying);
        verify(&tx, Utc::now())?;

        ctx.progress().set(ProgressStep::Signing);
        let stx = SignedTransaction::signed_by(tx, ctx.keypair());

        let session = ctx.initiate(&requester, TransferCommand::Decline).await?;
        let stx = notarise(ctx, stx).await?;
        finalize(ctx, stx, vec![session]).await
    }
}

/// Requester side of [`DeclineFlow`]. Nothing to sign, only to record.
pub async fn decline_responder(
    ctx: &FlowContext,
    mut session: FlowSession,
) -> Result<(), FlowError> {
    receive_finality(ctx, &mut session, None).await?;
    Ok(())
}
