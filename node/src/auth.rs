//! # Request Authentication
//!
//! Every mutating request names its `caller` (a hex Ed25519 public key),
//! carries a `nonce`, and is signed over
//! [`canonical_message`](htlc_protocol::crypto::signatures::canonical_message).
//! The signature is checked first, then the nonce must be strictly greater
//! than the last one accepted for that caller; nonces start at 1. A nonce is
//! consumed even if the escrow later rejects the operation, so a signed
//! request can be submitted at most once.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use htlc_protocol::crypto::signatures::{canonical_message, verify_caller, SignatureError};
use htlc_protocol::Address;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid signature: {0}")]
    BadSignature(#[from] SignatureError),

    #[error("stale nonce {nonce} for {caller}: last accepted was {last}")]
    StaleNonce {
        caller: Address,
        nonce: u64,
        last: u64,
    },
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::BadSignature(_) => "bad_signature",
            AuthError::StaleNonce { .. } => "stale_nonce",
        }
    }
}

/// Last accepted nonce per caller.
#[derive(Debug, Default)]
pub struct Authenticator {
    nonces: DashMap<Address, u64>,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `signature_hex` over `(action, fields, nonce)` and consume the
    /// nonce.
    pub fn authenticate(
        &self,
        caller: &Address,
        action: &str,
        fields: &[&str],
        nonce: u64,
        signature_hex: &str,
    ) -> Result<(), AuthError> {
        let message = canonical_message(action, fields, nonce);
        verify_caller(caller, &message, signature_hex)?;

        let stale = |last| AuthError::StaleNonce {
            caller: caller.clone(),
            nonce,
            last,
        };
        match self.nonces.entry(caller.clone()) {
            Entry::Occupied(mut slot) => {
                let last = *slot.get();
                if nonce <= last {
                    return Err(stale(last));
                }
                slot.insert(nonce);
            }
            // Zero is reserved; the first nonce is at least 1.
            Entry::Vacant(_) if nonce == 0 => return Err(stale(0)),
            Entry::Vacant(slot) => {
                slot.insert(nonce);
            }
        }
        Ok(())
    }

    /// Last accepted nonce, or `None` if the caller has never signed.
    pub fn last_nonce(&self, caller: &Address) -> Option<u64> {
        self.nonces.get(caller).map(|n| *n)
    }
}
