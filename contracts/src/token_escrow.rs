//! # Token Escrow
//!
//! HTLCs over fungible tokens held on external [`TokenLedger`]s.
//!
//! The sender first approves the token custody account as spender. On
//! creation the escrow pulls `amount` with `transfer_from` into custody;
//! only a successful pull lets the record be inserted, and the duplicate
//! check runs before the pull so no pulled tokens are ever left without a
//! record. Settlement pushes `amount` from custody with `transfer`, and the
//! state change commits only if that push succeeded.
//!
//! Any number of tokens can be registered. Contracts created here carry
//! `Asset::Token(<token address>)`.

use htlc_protocol::config::TOKEN_CUSTODY_ACCOUNT;
use htlc_protocol::vault::{TokenError, TokenLedger};
use htlc_protocol::Address;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::HtlcError;
use crate::ledger::ContractLedger;
use crate::types::{Asset, ContractId, HtlcContract, NewContract, Preimage};

/// HTLCs funded with tokens pulled from an allowance.
pub struct TokenEscrow {
    ledger: Arc<ContractLedger>,
    tokens: RwLock<HashMap<Address, Arc<dyn TokenLedger>>>,
    custody: Address,
}

impl std::fmt::Debug for TokenEscrow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEscrow")
            .field("custody", &self.custody)
            .field("tokens", &self.tokens.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TokenEscrow {
    pub fn new(ledger: Arc<ContractLedger>) -> Self {
        Self {
            ledger,
            tokens: RwLock::new(HashMap::new()),
            custody: Address::from_static(TOKEN_CUSTODY_ACCOUNT),
        }
    }

    /// Accept contracts in `token`. Re-registering an address replaces the
    /// previous ledger.
    pub fn register_token(&self, token: Arc<dyn TokenLedger>) {
        let address = token.token().clone();
        info!(token = %address, "token registered");
        self.tokens.write().insert(address, token);
    }

    pub fn token(&self, address: &Address) -> Result<Arc<dyn TokenLedger>, HtlcError> {
        self.tokens
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| HtlcError::UnknownToken {
                token: address.clone(),
            })
    }

    pub fn tokens(&self) -> Vec<Address> {
        let mut out: Vec<_> = self.tokens.read().keys().cloned().collect();
        out.sort();
        out
    }

    /// The spender senders must approve before creating a contract.
    pub fn custody(&self) -> &Address {
        &self.custody
    }

    /// Pull `terms.amount` of `token` from `sender` and lock it.
    ///
    /// # Errors
    ///
    /// The ledger's creation errors, plus:
    /// - [`HtlcError::CustodyAccount`] if either party is the custody account.
    /// - [`HtlcError::UnknownToken`] if `token` isn't registered.
    /// - [`HtlcError::InsufficientAuthorization`] if the sender's allowance
    ///   to custody is below `amount`.
    /// - [`HtlcError::ExternalTransferFailed`] for any other pull failure.
    pub fn new_contract(
        &self,
        sender: &Address,
        token: &Address,
        terms: &NewContract,
    ) -> Result<ContractId, HtlcError> {
        self.ledger.check_custody(&self.custody, sender, terms)?;
        let ledger = self.token(token)?;
        self.ledger
            .create(sender, Asset::Token(token.clone()), terms, |contract| {
                ledger
                    .transfer_from(&self.custody, &contract.sender, &self.custody, contract.amount)
                    .map_err(|e| {
                        warn!(token = %token, sender = %contract.sender, error = %e, "token pull failed");
                        pull_error(token, e)
                    })
            })
    }

    /// Pay the contract out to its receiver by revealing the preimage.
    pub fn withdraw(
        &self,
        id: &ContractId,
        caller: &Address,
        preimage: &Preimage,
    ) -> Result<u64, HtlcError> {
        let (asset, ledger) = self.resolve(id)?;
        self.ledger
            .withdraw(id, caller, preimage, &asset, |contract| {
                self.push(ledger.as_ref(), contract, &contract.receiver)
            })
    }

    /// Return an expired contract's tokens to its sender.
    pub fn refund(&self, id: &ContractId, caller: &Address) -> Result<u64, HtlcError> {
        let (asset, ledger) = self.resolve(id)?;
        self.ledger.refund(id, caller, &asset, |contract| {
            self.push(ledger.as_ref(), contract, &contract.sender)
        })
    }

    pub fn get_contract(&self, id: &ContractId) -> Result<HtlcContract, HtlcError> {
        self.ledger.get(id)
    }

    /// The token ledger holding a contract's funds. The asset is immutable,
    /// so reading it ahead of the locked transition is safe.
    fn resolve(&self, id: &ContractId) -> Result<(Asset, Arc<dyn TokenLedger>), HtlcError> {
        let contract = self.ledger.get(id)?;
        match &contract.asset {
            Asset::Token(token) => {
                let ledger = self.token(token)?;
                Ok((contract.asset.clone(), ledger))
            }
            Asset::Native => Err(HtlcError::AssetMismatch {
                id: *id,
                found: Asset::Native,
            }),
        }
    }

    fn push(
        &self,
        ledger: &dyn TokenLedger,
        contract: &HtlcContract,
        to: &Address,
    ) -> Result<(), HtlcError> {
        ledger
            .transfer(&self.custody, to, contract.amount)
            .map_err(|e| {
                warn!(contract = %contract.id, to = %to, error = %e, "token release failed");
                HtlcError::ExternalTransferFailed {
                    asset: contract.asset.clone(),
                    reason: e.to_string(),
                }
            })
    }
}

fn pull_error(token: &Address, error: TokenError) -> HtlcError {
    match error {
        TokenError::InsufficientAllowance {
            owner,
            allowance,
            requested,
            ..
        } => HtlcError::InsufficientAuthorization {
            token: token.clone(),
            owner,
            allowance,
            requested,
        },
        other => HtlcError::ExternalTransferFailed {
            asset: Asset::Token(token.clone()),
            reason: other.to_string(),
        },
    }
}
