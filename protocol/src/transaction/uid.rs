//! Content-derived transfer request identifiers.
//!
//! A request's uid is fixed at creation and carried unchanged by its
//! approved successor, so approve and decline can look a request up by a
//! short hex prefix. Two requests created from identical fields at the same
//! instant collide; the notary arbitrates in that case.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::crypto::hash::sha256_fields;
use crate::crypto::keys::RemitPublicKey;

/// Derives the uid of a new transfer request.
///
/// The digest covers, in order: issuer key, requester key, amount (decimal),
/// creation instant (RFC 3339 with nanoseconds), title and description.
/// Each field is length-prefixed, so free text cannot shift a boundary.
pub fn transfer_request_uid(
    issuer: &RemitPublicKey,
    requester: &RemitPublicKey,
    amount: i64,
    requested_at: DateTime<Utc>,
    title: &str,
    description: &str,
) -> String {
    let amount = amount.to_string();
    let requested_at = requested_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let digest = sha256_fields(&[
        issuer.as_bytes(),
        requester.as_bytes(),
        amount.as_bytes(),
        requested_at.as_bytes(),
        title.as_bytes(),
        description.as_bytes(),
    ]);
    hex::encode(digest)
}
