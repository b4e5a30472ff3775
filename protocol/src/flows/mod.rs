//! # Flows
//!
//! The multi-party protocols that move a transfer request through its
//! lifecycle. Each flow has an initiator, run on the caller's task, and a
//! responder, spawned by the counterparty's node for every incoming session.
//!
//! ```text
//! request.rs  — requester → issuer          Solicit(true), sign, finalize
//! approve.rs  — issuer → requester          Solicit(true), sign, finalize
//!               issuer → other observers    Solicit(false), finalize
//! decline.rs  — issuer → requester          finalize
//! finality.rs — signature collection, notarisation, finality
//! context.rs  — per-call FlowContext
//! progress.rs — ProgressTracker
//! ```
//!
//! Every initiator verifies the contract locally before contacting anyone,
//! and nothing is committed unless the notary accepts the transaction.

pub mod approve;
pub mod context;
pub mod decline;
pub mod error;
pub mod finality;
pub mod progress;
pub mod request;

pub use approve::{approve_responder, check_approve_proposal, ApproveFlow};
pub use context::FlowContext;
pub use decline::{decline_responder, DeclineFlow};
pub use error::FlowError;
pub use progress::{ProgressStep, ProgressTracker};
pub use request::{check_request_proposal, request_responder, RequestFlow};

use tracing::{debug, info, warn};

use crate::network::IncomingSession;
use crate::transaction::{SignedTransaction, StateAndRef, TransferCommand, TransferState};

/// Finds the unconsumed pending request this node issued whose uid starts
/// with `prefix`. If several match, the first in reference order wins.
pub(crate) fn locate_pending(ctx: &FlowContext, prefix: &str) -> Result<StateAndRef, FlowError> {
    ctx.progress().set(ProgressStep::Locating);
    let me = ctx.me();
    let mut matches = ctx.vault().query_unconsumed(&|s: &TransferState| {
        s.uid.starts_with(prefix) && !s.approved && s.issuer == *me
    });
    if matches.len() > 1 {
        debug!(prefix, matches = matches.len(), "uid prefix is ambiguous, taking first");
    }
    if matches.is_empty() {
        return Err(FlowError::NotFound {
            prefix: prefix.to_string(),
        });
    }
    Ok(matches.swap_remove(0))
}

/// Marks the tracker terminal and logs the outcome.
pub(crate) fn finish(
    ctx: &FlowContext,
    result: Result<SignedTransaction, FlowError>,
) -> Result<SignedTransaction, FlowError> {
    let progress = ctx.progress();
    match &result {
        Ok(stx) => {
            progress.set(ProgressStep::Done);
            info!(flow = progress.flow(), run = %progress.run_id(), tx = %stx.id(), "flow finished");
        }
        Err(err) => {
            progress.set(ProgressStep::Failed);
            warn!(flow = progress.flow(), run = %progress.run_id(), error = %err, "flow failed");
        }
    }
    result
}

/// Runs the responder matching the incoming session's flow.
pub async fn respond(ctx: &FlowContext, incoming: IncomingSession) -> Result<(), FlowError> {
    let IncomingSession { flow, session } = incoming;
    let result = match flow {
        TransferCommand::Request => request_responder(ctx, session).await,
        TransferCommand::Approve => approve_responder(ctx, session).await,
        TransferCommand::Decline => decline_responder(ctx, session).await,
    };
    let progress = ctx.progress();
    match &result {
        Ok(()) => {
            progress.set(ProgressStep::Done);
        }
        Err(err) => {
            progress.set(ProgressStep::Failed);
            debug!(flow = %flow, me = %ctx.me(), error = %err, "responder ended early");
        }
    }
    result
}
