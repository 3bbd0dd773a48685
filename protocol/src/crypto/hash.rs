//! # Hashing Utilities
//!
//! SHA-256, and only SHA-256. Hashlocks must be checkable by whatever ledger
//! holds the mirrored leg of the swap, and SHA-256 is the one hash every
//! chain has a precompile or opcode for. Contract identifiers use it too,
//! so an off-ledger watcher needs exactly one hash function.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// Returns a 32-byte digest as a `Vec<u8>`. Use [`sha256_array`] when the
/// result feeds a fixed-size type.
///
/// # Example
///
/// ```
/// use htlc_protocol::crypto::sha256;
///
/// let hash = sha256(b"hashed timelock");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
///
/// This is what hashlocks are made of.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeding the parts sequentially into one hasher gives the same digest as
/// hashing their concatenation, minus the temporary buffer. Contract ids
/// hash `(sender || receiver || asset || amount || ...)` this way.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
