// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HTLC Protocol: Primitives
//!
//! The leaf layer underneath the hashed timelock escrow. Nothing in here
//! knows what a hashlock is; it only knows how to hash, who is calling,
//! what time it is, and where value lives.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants. Every magic number lives here.
//! - **crypto**: SHA-256 hashing and Ed25519 keys/signatures.
//! - **identity**: [`Address`](identity::Address), the validated party identifier.
//! - **clock**: The time source escrow operations compare timelocks against.
//!   Callers never get to supply their own "now".
//! - **vault**: Native value balances and the fungible token ledger that
//!   the token escrow pulls from and pushes to.
//!
//! ## Design Philosophy
//!
//! 1. All amounts are `u64` in smallest units, and every addition is checked.
//! 2. Shared state sits behind `parking_lot` locks. No poisoning, no
//!    `unwrap()` on a lock guard.
//! 3. If it touches money, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod vault;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Address, AddressError};
