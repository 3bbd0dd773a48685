//! # Identity Module
//!
//! Who is calling, and who owns what.
//!
//! An [`Address`] is an opaque, validated party identifier. Key-holding
//! parties use the hex encoding of their Ed25519 public key; system
//! accounts (escrow custody, genesis treasuries) use readable names like
//! `htlc:native-escrow`. The escrow only ever compares addresses for
//! equality, so both kinds coexist without ceremony.

pub mod address;

pub use address::{Address, AddressError};
