//! # Storage Module
//!
//! Where each party keeps its view of the ledger.
//!
//! ```text
//! vault.rs — VaultService trait and the in-memory vault
//! ```
//!
//! There is no shared global ledger: every party records only the
//! transactions sent to it, and the notary alone decides which inputs have
//! been spent.

pub mod vault;

pub use vault::{InMemoryVault, VaultService};
