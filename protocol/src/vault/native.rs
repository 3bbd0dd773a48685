//! # Native Value Bank
//!
//! The native currency: what a native HTLC locks when it is created and
//! releases when it settles. Balances are keyed by [`Address`] and guarded
//! by a single `parking_lot::RwLock`, which keeps a transfer's debit and
//! credit in one critical section.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from native balance mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        available: u64,
        requested: u64,
    },

    #[error("balance overflow in {account}: current {current}, credit {credit}")]
    Overflow {
        account: Address,
        current: u64,
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// NativeBank
// ---------------------------------------------------------------------------

/// Thread-safe native balances.
///
/// # Examples
///
/// ```
/// use htlc_protocol::{Address, vault::NativeBank};
///
/// let bank = NativeBank::new();
/// let alice = Address::new("alice").unwrap();
/// let bob = Address::new("bob").unwrap();
///
/// bank.credit(&alice, 10).unwrap();
/// bank.transfer(&alice, &bob, 4).unwrap();
/// assert_eq!(bank.balance_of(&alice), 6);
/// assert_eq!(bank.balance_of(&bob), 4);
/// ```
#[derive(Debug, Default)]
pub struct NativeBank {
    balances: RwLock<HashMap<Address, u64>>,
}

impl NativeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`; zero for accounts never seen.
    pub fn balance_of(&self, account: &Address) -> u64 {
        self.balances.read().get(account).copied().unwrap_or(0)
    }

    /// Add `amount` to `account`. Genesis funding and test setup use this.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`BankError::Overflow`] if the balance would exceed `u64::MAX`.
    pub fn credit(&self, account: &Address, amount: u64) -> Result<u64, BankError> {
        let mut balances = self.balances.write();
        let current = balances.get(account).copied().unwrap_or(0);
        let updated = current.checked_add(amount).ok_or_else(|| BankError::Overflow {
            account: account.clone(),
            current,
            credit: amount,
        })?;
        balances.insert(account.clone(), updated);
        Ok(updated)
    }

    /// Move `amount` from `from` to `to` atomically.
    ///
    /// Both sides are checked before either is written, so a failure leaves
    /// both balances exactly as they were.
    pub fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), BankError> {
        let mut balances = self.balances.write();

        let from_balance = balances.get(from).copied().unwrap_or(0);
        let from_after =
            from_balance
                .checked_sub(amount)
                .ok_or_else(|| BankError::InsufficientFunds {
                    account: from.clone(),
                    available: from_balance,
                    requested: amount,
                })?;

        if from == to {
            return Ok(());
        }

        let to_balance = balances.get(to).copied().unwrap_or(0);
        let to_after = to_balance
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow {
                account: to.clone(),
                current: to_balance,
                credit: amount,
            })?;

        balances.insert(from.clone(), from_after);
        balances.insert(to.clone(), to_after);
        Ok(())
    }

    /// Sum of all balances. Conservation checks in tests lean on this.
    pub fn total(&self) -> u128 {
        self.balances.read().values().map(|v| u128::from(*v)).sum()
    }
}
