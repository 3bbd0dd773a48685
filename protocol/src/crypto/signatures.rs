//! # Request Signatures
//!
//! Nodes authenticate callers by checking an Ed25519 signature over a
//! canonical action string. The escrow itself never sees signatures; it
//! only sees the [`Address`](crate::identity::Address) the node recovered.
//!
//! Canonical messages are plain text, one field per line, prefixed with a
//! domain tag so a signature for one action can't be replayed as another:
//!
//! ```text
//! htlc/v1/refund
//! <contract id hex>
//! <nonce>
//! ```

use thiserror::Error;

use super::keys::{HtlcKeypair, HtlcPublicKey, HtlcSignature, KeyError};
use crate::identity::Address;

/// Domain prefix for every signed escrow request.
pub const SIGNING_DOMAIN: &str = "htlc/v1";

/// Errors when authenticating a signed request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("caller {0} is not a public-key address")]
    NotAKeyAddress(Address),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Sign `message` with `keypair`.
pub fn sign(keypair: &HtlcKeypair, message: &[u8]) -> HtlcSignature {
    keypair.sign(message)
}

/// Verify `signature` over `message` by `public_key`.
pub fn verify(public_key: &HtlcPublicKey, message: &[u8], signature: &HtlcSignature) -> bool {
    public_key.verify(message, signature)
}

/// Build the canonical byte string for an action.
///
/// # Example
///
/// ```
/// use htlc_protocol::crypto::signatures::canonical_message;
///
/// let msg = canonical_message("withdraw", &["ab12", "cd34"], 3);
/// assert_eq!(msg, b"htlc/v1/withdraw\nab12\ncd34\n3".to_vec());
/// ```
pub fn canonical_message(action: &str, fields: &[&str], nonce: u64) -> Vec<u8> {
    let mut out = format!("{SIGNING_DOMAIN}/{action}");
    for field in fields {
        out.push('\n');
        out.push_str(field);
    }
    out.push('\n');
    out.push_str(&nonce.to_string());
    out.into_bytes()
}

/// Check that `caller` signed `message`.
///
/// The caller's address must decode to a public key; named system accounts
/// (custody accounts, genesis treasuries) can't sign and are rejected.
pub fn verify_caller(
    caller: &Address,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let public_key = HtlcPublicKey::from_hex(caller.as_str())
        .map_err(|_| SignatureError::NotAKeyAddress(caller.clone()))?;
    let signature = HtlcSignature::from_hex(signature_hex)?;
    if public_key.verify(message, &signature) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_free_functions() {
        let kp = HtlcKeypair::generate();
        let sig = sign(&kp, b"hello");
        assert!(verify(&kp.public_key(), b"hello", &sig));
        assert!(!verify(&kp.public_key(), b"hell0", &sig));
    }

    #[test]
    fn test_canonical_message_is_domain_separated() {
        let withdraw = canonical_message("withdraw", &["id"], 1);
        let refund = canonical_message("refund", &["id"], 1);
        assert_ne!(withdraw, refund);
        assert!(withdraw.starts_with(b"htlc/v1/withdraw\n"));
    }

    #[test]
    fn test_canonical_message_nonce_changes_bytes() {
        assert_ne!(
            canonical_message("refund", &["id"], 1),
            canonical_message("refund", &["id"], 2)
        );
    }

    #[test]
    fn test_verify_caller_accepts_owner() {
        let kp = HtlcKeypair::generate();
        let msg = canonical_message("refund", &["deadbeef"], 9);
        let sig = kp.sign(&msg);
        assert!(verify_caller(&kp.address(), &msg, &sig.to_hex()).is_ok());
    }

    #[test]
    fn test_verify_caller_rejects_impostor() {
        let owner = HtlcKeypair::generate();
        let impostor = HtlcKeypair::generate();
        let msg = canonical_message("refund", &["deadbeef"], 9);
        let sig = impostor.sign(&msg);
        assert_eq!(
            verify_caller(&owner.address(), &msg, &sig.to_hex()),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn test_verify_caller_rejects_named_account() {
        let named = Address::new("treasury").unwrap();
        let err = verify_caller(&named, b"msg", &"00".repeat(64)).unwrap_err();
        assert!(matches!(err, SignatureError::NotAKeyAddress(_)));
    }
}
