//! # Protocol Configuration & Constants
//!
//! Every magic number in REMIT lives here. If you're hardcoding a constant
//! somewhere else, move it here.
//!
//! The time-related values are part of the agreement between parties: a
//! request built with one validity window is verified by counterparties
//! that must accept it, so changing them is a coordinated upgrade.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Major version. Bump on changes to the verification rules.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version. Bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// Patch version. Bump on bug fixes that don't touch the rules.
pub const PROTOCOL_VERSION_PATCH: u16 = 0;

/// The full version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 public key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Digest length of both SHA-256 (request ids) and BLAKE3 (transaction ids).
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// How long a freshly created transfer request stays approvable.
/// After this window it can only be declined.
pub const REQUEST_VALIDITY_DAYS: i64 = 30;

/// Maximum time a flow waits for a single message from its counterparty
/// before the session is considered dead.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Buffered incoming-session requests per node before initiators block.
pub const INBOX_CAPACITY: usize = 64;

/// Buffered messages per session direction. The handshake never has more
/// than two messages in flight, so this is generous.
pub const SESSION_CHANNEL_CAPACITY: usize = 8;

/// Display name of the notary in locally simulated networks.
pub const DEFAULT_NOTARY_NAME: &str = "Notary";

// ---------------------------------------------------------------------------
// Flow Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters handed to every flow through its context.
///
/// Defaults match the constants above. Tests shrink `session_timeout` so a
/// dead counterparty fails fast.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Validity window stamped on new requests.
    pub request_validity: chrono::Duration,
    /// Per-message receive timeout on sessions.
    pub session_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            request_validity: chrono::Duration::days(REQUEST_VALIDITY_DAYS),
            session_timeout: SESSION_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
