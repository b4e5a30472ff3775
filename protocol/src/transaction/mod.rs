//! # Transaction Module
//!
//! The ledger data model and the rules that govern it.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — TransferState, StateRef, commands
//! uid.rs          — content-derived transfer request ids
//! builder.rs      — WireTransaction and its fluent builder
//! signing.rs      — SignedTransaction and signature checks
//! verification.rs — the transfer contract (Request / Approve / Decline)
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** a [`WireTransaction`] with [`TransactionBuilder`].
//! 2. **Verify** it against the contract with [`verify`].
//! 3. **Sign**: wrap it in a [`SignedTransaction`] and collect the
//!    counterparty's signature.
//! 4. **Notarise**: the notary claims the inputs and adds its signature.
//! 5. **Record**: every participant checks
//!    [`SignedTransaction::verify_required_signatures`] and stores it.

pub mod builder;
pub mod signing;
pub mod types;
pub mod uid;
pub mod verification;

pub use builder::{TransactionBuilder, WireTransaction};
pub use signing::{SignedTransaction, TransactionError, TransactionSignature};
pub use types::{Command, StateAndRef, StateRef, TransferCommand, TransferState, ValidUntil};
pub use uid::transfer_request_uid;
pub use verification::{verify, verify_transaction, ContractError, Transition};
