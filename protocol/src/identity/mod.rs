//! # Identity Module
//!
//! Every participant on the ledger is a [`Party`]: a display name bound to
//! an Ed25519 owning key. The keypair itself lives in [`crate::crypto::keys`];
//! this module re-exports it so higher-level code imports identity types
//! from one place.

pub mod party;

pub use crate::crypto::keys::{RemitKeypair, RemitPublicKey, RemitSignature};
pub use party::Party;
