//! Flow failure reasons, surfaced to whoever started the flow.

use thiserror::Error;

use crate::network::{NotaryError, SessionError};
use crate::transaction::{ContractError, StateRef, TransactionError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// No unconsumed pending request issued by this node matches the prefix.
    #[error("no pending request issued by this node matches uid prefix {prefix:?}")]
    NotFound { prefix: String },

    /// The proposed transaction breaks a contract rule.
    #[error("transaction rejected: {0}")]
    VerificationRejected(#[from] ContractError),

    /// Signatures are missing, invalid or cover different content.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    /// The counterparty looked at the proposal and would not sign it.
    #[error("{party} refused to sign: {reason}")]
    AuthorizationRefused { party: String, reason: String },

    /// Another transaction spent an input first.
    #[error("input(s) already consumed: {}", display_refs(.refs))]
    ConsumedInput { refs: Vec<StateRef> },

    /// The notary rejected the transaction for a reason other than a
    /// double spend.
    #[error("notary rejected transaction: {0}")]
    NotaryRejected(NotaryError),

    /// The configured request validity cannot be added to the current time.
    #[error("request validity of {seconds}s is out of range")]
    ValidityOutOfRange { seconds: i64 },

    #[error("session failure: {0}")]
    SessionFailure(#[from] SessionError),
}

impl From<NotaryError> for FlowError {
    fn from(err: NotaryError) -> Self {
        match err {
            NotaryError::Conflict { consumed } => Self::ConsumedInput { refs: consumed },
            other => Self::NotaryRejected(other),
        }
    }
}

impl FlowError {
    /// Short machine-friendly label, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::VerificationRejected(_) => "verification_rejected",
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::AuthorizationRefused { .. } => "authorization_refused",
            Self::ConsumedInput { .. } => "consumed_input",
            Self::NotaryRejected(_) => "notary_rejected",
            Self::ValidityOutOfRange { .. } => "validity_out_of_range",
            Self::SessionFailure(_) => "session_failure",
        }
    }
}

fn display_refs(refs: &[StateRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_consumed_input() {
        let refs = vec![StateRef::new("ab", 0)];
        let err: FlowError = NotaryError::Conflict {
            consumed: refs.clone(),
        }
        .into();
        assert_eq!(err, FlowError::ConsumedInput { refs });
        assert_eq!(err.to_string(), "input(s) already consumed: ab(0)");
        assert_eq!(err.kind(), "consumed_input");
    }

    #[test]
    fn other_notary_errors_are_kept() {
        let err: FlowError = NotaryError::WrongNotary {
            named: "A".into(),
            actual: "B".into(),
        }
        .into();
        assert!(matches!(err, FlowError::NotaryRejected(_)));
    }

    #[test]
    fn contract_message_is_preserved() {
        let err: FlowError = ContractError::EmptyMetadata.into();
        assert!(err.to_string().ends_with("title/description cannot be empty"));
    }
}
