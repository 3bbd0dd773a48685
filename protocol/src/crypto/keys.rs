//! # Key Management
//!
//! Ed25519 keypairs for escrow participants.
//!
//! A party's [`Address`](crate::identity::Address) is the hex encoding of
//! its public key, so whoever holds the signing key is the only one who can
//! act as that party on a node: withdraw as receiver, refund as sender.
//!
//! Key bytes are never logged. Secret keys leave this module only through
//! [`HtlcKeypair::secret_key_hex`], which exists for `htlc-node init`.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use crate::identity::Address;

/// Errors from parsing key material.
///
/// Deliberately vague about *why* bytes were rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: expected {SECRET_KEY_LENGTH} hex-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid public key: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature: expected {SIGNATURE_LENGTH} hex-encoded bytes")]
    InvalidSignature,
}

/// An Ed25519 signing identity.
///
/// Not `Serialize`. Writing a secret key to disk should be an explicit
/// call to [`secret_key_hex`](Self::secret_key_hex), never a side effect of
/// dumping a struct into JSON.
///
/// # Examples
///
/// ```
/// use htlc_protocol::crypto::HtlcKeypair;
///
/// let kp = HtlcKeypair::generate();
/// let sig = kp.sign(b"refund 7f3a...");
/// assert!(kp.public_key().verify(b"refund 7f3a...", &sig));
/// ```
pub struct HtlcKeypair {
    signing_key: SigningKey,
}

/// The public half of a keypair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HtlcPublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

/// A 64-byte Ed25519 signature.
///
/// Stored as a `Vec<u8>` for serde. A signature of the wrong length simply
/// fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcSignature {
    bytes: Vec<u8>,
}

impl HtlcKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Tests and genesis
    /// fixtures use this; production keys come from [`generate`](Self::generate).
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a keypair from a hex-encoded secret key, as written by
    /// `htlc-node init`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> HtlcPublicKey {
        HtlcPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// The escrow address this keypair controls.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    pub fn sign(&self, message: &[u8]) -> HtlcSignature {
        let signature: DalekSignature = self.signing_key.sign(message);
        HtlcSignature {
            bytes: signature.to_bytes().to_vec(),
        }
    }

    /// Hex-encoded secret key. Handle with care.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for HtlcKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half.
        f.debug_struct("HtlcKeypair")
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

impl HtlcPublicKey {
    /// Parse raw bytes, rejecting anything that isn't a valid curve point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes: *bytes })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidPublicKey)?;
        let arr: [u8; PUBLIC_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(&arr)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Addresses are lowercase hex public keys.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.bytes)
    }

    /// Verify a signature over `message`. Malformed signatures and invalid
    /// keys both come back as `false`.
    pub fn verify(&self, message: &[u8], signature: &HtlcSignature) -> bool {
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
}

impl fmt::Debug for HtlcPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HtlcPublicKey({})", self.to_hex())
    }
}

impl fmt::Display for HtlcPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl HtlcSignature {
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for HtlcSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "HtlcSignature({}...)", &hex[..hex.len().min(16)])
    }
}
