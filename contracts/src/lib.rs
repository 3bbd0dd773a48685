//! # HTLC Contracts
//!
//! Hashed timelock contracts: value locked for a receiver behind a SHA-256
//! hashlock, with a deadline after which the sender can take it back.
//!
//! - **ContractLedger**: the authoritative table of contracts. Owns
//!   validation, the `Active → Withdrawn | Refunded` transitions, and event
//!   publication.
//! - **NativeEscrow**: contracts over native value held in a
//!   [`NativeBank`](htlc_protocol::vault::NativeBank).
//! - **TokenEscrow**: contracts over fungible tokens pulled from an
//!   allowance on a [`TokenLedger`](htlc_protocol::vault::TokenLedger).
//!
//! ## Design Principles
//!
//! 1. State transitions are explicit: enum variants, not boolean flags. A
//!    record that is both withdrawn and refunded can't be built.
//! 2. Value moves inside the same per-record critical section that flips
//!    the state. The flip is committed only if the transfer succeeded.
//! 3. The ledger owns the clock. Callers never supply the current time.
//! 4. Every public type is serializable (serde) for the node's API.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use htlc_contracts::{ContractLedger, NativeEscrow, NewContract, Preimage};
//! use htlc_protocol::{vault::NativeBank, Address};
//!
//! let ledger = Arc::new(ContractLedger::default());
//! let bank = Arc::new(NativeBank::new());
//! let escrow = NativeEscrow::new(ledger.clone(), bank.clone());
//!
//! let alice = Address::new("alice").unwrap();
//! let bob = Address::new("bob").unwrap();
//! bank.credit(&alice, 100).unwrap();
//!
//! let secret = Preimage::random();
//! let id = escrow
//!     .new_contract(
//!         &alice,
//!         &NewContract {
//!             receiver: bob.clone(),
//!             amount: 40,
//!             hashlock: secret.hashlock(),
//!             timelock: ledger.now() + 3600,
//!         },
//!     )
//!     .unwrap();
//!
//! escrow.withdraw(&id, &bob, &secret).unwrap();
//! assert_eq!(bank.balance_of(&bob), 40);
//! assert_eq!(escrow.get_contract(&id).unwrap().secret(), Some(&secret));
//! ```

pub mod error;
pub mod events;
pub mod ledger;
pub mod native_escrow;
pub mod token_escrow;
pub mod types;

pub use error::HtlcError;
pub use events::{EventLog, EventSink, HtlcEvent, NullSink};
pub use ledger::ContractLedger;
pub use native_escrow::NativeEscrow;
pub use token_escrow::TokenEscrow;
pub use types::{
    Asset, ContractId, ContractState, Hashlock, HtlcContract, NewContract, Preimage, Role,
    Settlement,
};
