//! # Cryptographic Primitives
//!
//! Everything security-related in the escrow flows through here:
//!
//! - **SHA-256** for hashlocks and contract identifiers. Not because it's
//!   the fastest, but because the other leg of the swap is almost certainly
//!   checking SHA-256 too.
//! - **Ed25519** for authenticating callers. Whoever signs the request is
//!   the identity the escrow checks against `sender` / `receiver`.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{sha256, sha256_array, sha256_multi};
pub use keys::{HtlcKeypair, HtlcPublicKey, HtlcSignature};
pub use signatures::{sign, verify};
