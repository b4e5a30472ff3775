//! Point-to-point flow sessions over in-process channels.
//!
//! A session is a pair of bounded `tokio::mpsc` channels, one per direction.
//! The initiator keeps one end; the other end is delivered, wrapped in an
//! [`IncomingSession`], to the counterparty's inbox, where its dispatcher
//! picks a responder by the flow kind.
//!
//! Every receive is bounded by the session timeout. A dropped peer shows up
//! as [`SessionError::Closed`].

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::{INBOX_CAPACITY, SESSION_CHANNEL_CAPACITY};
use crate::identity::Party;
use crate::transaction::{SignedTransaction, TransactionSignature, TransferCommand};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Everything that travels over a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMessage {
    /// Whether the responder is being asked to sign.
    Solicit(bool),
    /// A proposal carrying the initiator's signature.
    SignatureRequest(SignedTransaction),
    SignatureResponse(TransactionSignature),
    /// The responder will not sign, with its reason.
    Refused(String),
    /// The notarised transaction to record.
    Finalize(SignedTransaction),
    /// The responder recorded the finalized transaction.
    Ack,
}

impl SessionMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Solicit(_) => "Solicit",
            Self::SignatureRequest(_) => "SignatureRequest",
            Self::SignatureResponse(_) => "SignatureResponse",
            Self::Refused(_) => "Refused",
            Self::Finalize(_) => "Finalize",
            Self::Ack => "Ack",
        }
    }
}

impl fmt::Display for SessionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no route to party {0}")]
    UnknownParty(String),

    #[error("session with {0} closed")]
    Closed(String),

    #[error("timed out after {timeout:?} waiting for {party}")]
    Timeout { party: String, timeout: Duration },

    #[error("unexpected {got} from {party}, expected {expected}")]
    UnexpectedMessage {
        party: String,
        expected: &'static str,
        got: &'static str,
    },
}

// ---------------------------------------------------------------------------
// FlowSession
// ---------------------------------------------------------------------------

/// One end of a session with `counterparty`.
#[derive(Debug)]
pub struct FlowSession {
    counterparty: Party,
    outbound: mpsc::Sender<SessionMessage>,
    inbound: mpsc::Receiver<SessionMessage>,
    timeout: Duration,
}

impl FlowSession {
    /// Two connected ends: the first talks to `b`, the second to `a`.
    fn pair(a: &Party, b: &Party, timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        (
            Self {
                counterparty: b.clone(),
                outbound: a_tx,
                inbound: a_rx,
                timeout,
            },
            Self {
                counterparty: a.clone(),
                outbound: b_tx,
                inbound: b_rx,
                timeout,
            },
        )
    }

    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub async fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        trace!(to = %self.counterparty, message = message.kind(), "send");
        self.outbound
            .send(message)
            .await
            .map_err(|_| SessionError::Closed(self.counterparty.to_string()))
    }

    pub async fn receive(&mut self) -> Result<SessionMessage, SessionError> {
        match tokio::time::timeout(self.timeout, self.inbound.recv()).await {
            Ok(Some(message)) => {
                trace!(from = %self.counterparty, message = message.kind(), "receive");
                Ok(message)
            }
            Ok(None) => Err(SessionError::Closed(self.counterparty.to_string())),
            Err(_) => Err(SessionError::Timeout {
                party: self.counterparty.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    /// Builds the error for a message that does not fit the protocol step.
    pub fn unexpected(&self, expected: &'static str, got: &SessionMessage) -> SessionError {
        SessionError::UnexpectedMessage {
            party: self.counterparty.to_string(),
            expected,
            got: got.kind(),
        }
    }

    pub async fn receive_solicit(&mut self) -> Result<bool, SessionError> {
        match self.receive().await? {
            SessionMessage::Solicit(flag) => Ok(flag),
            other => Err(self.unexpected("Solicit", &other)),
        }
    }

    pub async fn receive_signature_request(&mut self) -> Result<SignedTransaction, SessionError> {
        match self.receive().await? {
            SessionMessage::SignatureRequest(stx) => Ok(stx),
            other => Err(self.unexpected("SignatureRequest", &other)),
        }
    }

    pub async fn receive_finalize(&mut self) -> Result<SignedTransaction, SessionError> {
        match self.receive().await? {
            SessionMessage::Finalize(stx) => Ok(stx),
            other => Err(self.unexpected("Finalize", &other)),
        }
    }

    pub async fn receive_ack(&mut self) -> Result<(), SessionError> {
        match self.receive().await? {
            SessionMessage::Ack => Ok(()),
            other => Err(self.unexpected("Ack", &other)),
        }
    }
}

/// A session opened by another party, as seen from the receiving node.
#[derive(Debug)]
pub struct IncomingSession {
    /// Which flow the initiator is running.
    pub flow: TransferCommand,
    pub session: FlowSession,
}

// ---------------------------------------------------------------------------
// InMemoryNetwork
// ---------------------------------------------------------------------------

/// Routes new sessions to the inbox of the target party.
#[derive(Default)]
pub struct InMemoryNetwork {
    inboxes: DashMap<Party, mpsc::Sender<IncomingSession>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `party` and returns its inbox. Registering again replaces
    /// the previous inbox.
    pub fn register(&self, party: Party) -> mpsc::Receiver<IncomingSession> {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        debug!(party = %party, "registered on network");
        self.inboxes.insert(party, tx);
        rx
    }

    /// Removes `party`. Its dispatcher stops once the inbox drains.
    pub fn unregister(&self, party: &Party) {
        self.inboxes.remove(party);
    }

    pub fn is_registered(&self, party: &Party) -> bool {
        self.inboxes.contains_key(party)
    }

    /// Opens a session from `from` to `to` for `flow` and delivers the
    /// responder end to `to`'s inbox.
    pub async fn initiate_session(
        &self,
        from: &Party,
        to: &Party,
        flow: TransferCommand,
        timeout: Duration,
    ) -> Result<FlowSession, SessionError> {
        let inbox = self
            .inboxes
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownParty(to.to_string()))?;

        let (ours, theirs) = FlowSession::pair(from, to, timeout);
        inbox
            .send(IncomingSession {
                flow,
                session: theirs,
            })
            .await
            .map_err(|_| SessionError::Closed(to.to_string()))?;

        debug!(from = %from, to = %to, flow = %flow, "session opened");
        Ok(ours)
    }
}
