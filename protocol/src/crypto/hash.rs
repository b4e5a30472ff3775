//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** derives transfer request ids from their creation fields.
//!   The id is shown to humans and matched by prefix, so it follows the
//!   familiar 64-hex-character form.
//! - **BLAKE3** derives transaction ids from canonical transaction bytes.
//!   Every signature in the protocol is made over one of these ids.

use sha2::{Digest, Sha256};

use crate::config::HASH_OUTPUT_LENGTH;

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; HASH_OUTPUT_LENGTH];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 over several fields, each prefixed with its length as a
/// little-endian `u32`, so no two field lists share an encoding.
pub fn sha256_fields(fields: &[&[u8]]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u32).to_le_bytes());
        hasher.update(field);
    }
    let mut output = [0u8; HASH_OUTPUT_LENGTH];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    *blake3::hash(data).as_bytes()
}
