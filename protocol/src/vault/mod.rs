//! # Vault Module: Where Value Lives
//!
//! Escrows don't mint or burn anything. They move value between a party's
//! balance and a custody account, and this module holds those balances.
//!
//! ```text
//! native.rs   NativeBank, the native currency, one balance per address
//! token.rs    TokenLedger trait + FungibleToken, an allowance-based
//!             token ledger the token escrow pulls from and pushes to
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest units.** No floating point.
//! 2. **Every mutation is checked.** Underflow is an error, overflow is an
//!    error, and a failed mutation changes nothing.
//! 3. **Transfers are atomic.** Debit and credit happen under one write
//!    lock; nobody observes value in flight.

pub mod native;
pub mod token;

pub use native::{BankError, NativeBank};
pub use token::{FungibleToken, TokenError, TokenLedger};
