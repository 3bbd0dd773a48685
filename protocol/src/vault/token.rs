//! # Fungible Token Ledger
//!
//! Token HTLCs don't hold tokens themselves. They ask a token ledger to
//! move balances, using the familiar allowance model:
//!
//! 1. The sender calls `approve(custody, amount)` on the token.
//! 2. The escrow calls `transfer_from(custody, sender, custody, amount)` to
//!    pull the deposit.
//! 3. At settlement the escrow calls `transfer(custody, recipient, amount)`.
//!
//! [`TokenLedger`] is the narrow interface the escrow depends on.
//! [`FungibleToken`] is an in-memory implementation used by the node and by
//! every test. It also supports freezing accounts, which is how a token
//! issuer (and a test) makes a transfer fail on purpose.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by a token ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance for {owner}: available {available}, requested {requested}")]
    InsufficientBalance {
        owner: Address,
        available: u64,
        requested: u64,
    },

    #[error(
        "insufficient allowance: {owner} approved {spender} for {allowance}, requested {requested}"
    )]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: u64,
        requested: u64,
    },

    #[error("supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow { amount: u64 },

    #[error("balance overflow for {owner}: current {current}, credit {credit}")]
    BalanceOverflow {
        owner: Address,
        current: u64,
        credit: u64,
    },

    #[error("account {0} is frozen")]
    AccountFrozen(Address),
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// What the token escrow needs from a token.
///
/// Implementations must make each call atomic: either the whole transfer
/// happens or nothing changes. They must not call back into the escrow.
pub trait TokenLedger: Send + Sync {
    /// The token's own address, used as its asset descriptor.
    fn token(&self) -> &Address;

    fn balance_of(&self, owner: &Address) -> u64;

    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Move `amount` from `from` to `to`, authorized by `from` itself.
    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError>;

    /// Move `amount` from `owner` to `to`, authorized by a prior
    /// `approve(owner, spender, ..)`. Consumes that much allowance.
    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError>;
}

// ---------------------------------------------------------------------------
// FungibleToken
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, u64>,
    allowances: HashMap<(Address, Address), u64>,
    frozen: HashSet<Address>,
    total_supply: u64,
}

impl TokenState {
    fn check_not_frozen(&self, account: &Address) -> Result<(), TokenError> {
        if self.frozen.contains(account) {
            return Err(TokenError::AccountFrozen(account.clone()));
        }
        Ok(())
    }

    /// Validate then apply a balance move. Nothing is written on error.
    fn move_balance(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        self.check_not_frozen(from)?;
        self.check_not_frozen(to)?;

        let from_balance = self.balances.get(from).copied().unwrap_or(0);
        let from_after =
            from_balance
                .checked_sub(amount)
                .ok_or_else(|| TokenError::InsufficientBalance {
                    owner: from.clone(),
                    available: from_balance,
                    requested: amount,
                })?;
        if from == to {
            return Ok(());
        }
        let to_balance = self.balances.get(to).copied().unwrap_or(0);
        let to_after = to_balance
            .checked_add(amount)
            .ok_or_else(|| TokenError::BalanceOverflow {
                owner: to.clone(),
                current: to_balance,
                credit: amount,
            })?;

        self.balances.insert(from.clone(), from_after);
        self.balances.insert(to.clone(), to_after);
        Ok(())
    }
}

/// An in-memory, allowance-based fungible token.
///
/// # Examples
///
/// ```
/// use htlc_protocol::Address;
/// use htlc_protocol::vault::{FungibleToken, TokenLedger};
///
/// let token = FungibleToken::new(Address::new("usd-token").unwrap());
/// let alice = Address::new("alice").unwrap();
/// let escrow = Address::new("escrow").unwrap();
///
/// token.mint(&alice, 100).unwrap();
/// token.approve(&alice, &escrow, 40);
/// token.transfer_from(&escrow, &alice, &escrow, 40).unwrap();
/// assert_eq!(token.balance_of(&escrow), 40);
/// assert_eq!(token.allowance(&alice, &escrow), 0);
/// ```
#[derive(Debug)]
pub struct FungibleToken {
    address: Address,
    state: RwLock<TokenState>,
}

impl FungibleToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: RwLock::new(TokenState::default()),
        }
    }

    /// Create `amount` new tokens in `to`'s balance.
    ///
    /// # Errors
    ///
    /// [`TokenError::SupplyOverflow`] if total supply would exceed
    /// `u64::MAX`. Since every balance is bounded by total supply, a
    /// successful supply check means the balance credit can't overflow.
    pub fn mint(&self, to: &Address, amount: u64) -> Result<u64, TokenError> {
        let mut state = self.state.write();
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        let balance = state.balances.entry(to.clone()).or_insert(0);
        *balance += amount;
        let updated = *balance;
        state.total_supply = supply;
        debug!(token = %self.address, to = %to, amount, "minted");
        Ok(updated)
    }

    /// Set the amount `spender` may pull from `owner`. Overwrites any
    /// previous allowance.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: u64) {
        let mut state = self.state.write();
        state
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    pub fn total_supply(&self) -> u64 {
        self.state.read().total_supply
    }

    /// Block all transfers into or out of `account`.
    pub fn freeze(&self, account: &Address) {
        self.state.write().frozen.insert(account.clone());
    }

    pub fn unfreeze(&self, account: &Address) {
        self.state.write().frozen.remove(account);
    }
}

impl TokenLedger for FungibleToken {
    fn token(&self) -> &Address {
        &self.address
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        self.state.read().balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.state
            .read()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        self.state.write().move_balance(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        let mut state = self.state.write();
        let key = (owner.clone(), spender.clone());
        let allowance = state.allowances.get(&key).copied().unwrap_or(0);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowance,
                requested: amount,
            });
        }
        state.move_balance(owner, to, amount)?;
        state.allowances.insert(key, allowance - amount);
        Ok(())
    }
}
