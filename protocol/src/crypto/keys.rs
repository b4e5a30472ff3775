//! # Key Management
//!
//! Ed25519 keypairs, public keys and signatures for REMIT parties.
//!
//! Every party on the ledger owns exactly one keypair. The public half is
//! the party's owning key: it appears in transfer states, in command signer
//! lists, and in every signature attached to a transaction.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this).
//! - Key generation uses `OsRng`.
//! - Secret key bytes are never logged or printed by `Debug`.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{SIGNATURE_LENGTH, SIGNING_KEY_LENGTH, VERIFYING_KEY_LENGTH};

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected {SIGNATURE_LENGTH} bytes")]
    InvalidSignature,
}

/// A party's signing keypair.
///
/// Intentionally not `Serialize`: persisting a private key should be an
/// explicit `secret_key_bytes()` call, never a side effect of serializing a
/// larger struct.
pub struct RemitKeypair {
    signing_key: SigningKey,
}

/// The public half of a party's identity. Safe to share and log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemitPublicKey {
    bytes: [u8; VERIFYING_KEY_LENGTH],
}

/// An Ed25519 signature. Always 64 bytes when produced by [`RemitKeypair::sign`].
///
/// Stored as `Vec<u8>` for serde; a wrong-length value simply fails
/// verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemitSignature {
    bytes: Vec<u8>,
}

impl RemitKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Tests and fixtures only;
    /// a weak seed is a weak key.
    pub fn from_seed(seed: &[u8; SIGNING_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a keypair from a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SIGNING_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// The public key associated with this keypair.
    pub fn public_key(&self) -> RemitPublicKey {
        RemitPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 is deterministic: same key and message give
    /// the same signature.
    pub fn sign(&self, message: &[u8]) -> RemitSignature {
        RemitSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &RemitSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Raw secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SIGNING_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }
}

impl Clone for RemitKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for RemitKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemitKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// RemitPublicKey
// ---------------------------------------------------------------------------

impl RemitPublicKey {
    /// Parse a byte slice, rejecting wrong lengths and invalid points.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; VERIFYING_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_LENGTH] {
        &self.bytes
    }

    /// Verify a signature over `message`. Any malformed input is just `false`.
    pub fn verify(&self, message: &[u8], signature: &RemitSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature.bytes.as_slice()) else {
            return false;
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    /// Base58 representation, used for compact display in CLI output.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }
}

impl fmt::Display for RemitPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for RemitPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemitPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// RemitSignature
// ---------------------------------------------------------------------------

impl RemitSignature {
    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex-encoded signature. 128 characters for a valid signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for RemitSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for RemitSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "RemitSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "RemitSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = RemitKeypair::generate();
        let sig = kp.sign(b"approve 1000");
        assert!(kp.verify(b"approve 1000", &sig));
        assert!(!kp.verify(b"approve 1500", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = RemitKeypair::generate();
        let kp2 = RemitKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [7u8; 32];
        assert_eq!(
            RemitKeypair::from_seed(&seed).public_key(),
            RemitKeypair::from_seed(&seed).public_key()
        );
    }

    #[test]
    fn hex_roundtrips() {
        let kp = RemitKeypair::generate();
        let restored = RemitKeypair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());

        let pk = kp.public_key();
        assert_eq!(RemitPublicKey::from_hex(&pk.to_hex()).unwrap(), pk);

        let sig = kp.sign(b"x");
        assert_eq!(RemitSignature::from_hex(&sig.to_hex()).unwrap(), sig);
    }

    #[test]
    fn invalid_inputs_rejected() {
        assert!(RemitKeypair::from_hex("deadbeef").is_err());
        assert!(RemitKeypair::from_hex("not-hex").is_err());
        assert!(RemitPublicKey::try_from_slice(&[0u8; 16]).is_err());
        assert!(RemitSignature::from_hex("abcd").is_err());
    }

    #[test]
    fn truncated_signature_does_not_verify() {
        let kp = RemitKeypair::generate();
        let sig = kp.sign(b"m");
        let short = RemitSignature {
            bytes: sig.as_bytes()[..32].to_vec(),
        };
        assert!(!kp.verify(b"m", &short));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = RemitKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("RemitKeypair(pub="));
        assert!(!debug_str.contains(&hex::encode(kp.secret_key_bytes())));
    }

    #[test]
    fn clone_preserves_identity() {
        let kp = RemitKeypair::generate();
        assert_eq!(kp.clone().secret_key_bytes(), kp.secret_key_bytes());
    }
}
