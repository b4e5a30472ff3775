//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for party keys and transaction signatures.
//! - **SHA-256** (`sha2`) for transfer request ids.
//! - **BLAKE3** (`blake3`) for transaction ids.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, sha256_array, sha256_fields};
pub use keys::{KeyError, RemitKeypair, RemitPublicKey, RemitSignature};
