//! # Native Escrow
//!
//! HTLCs over native value. Creating a contract moves exactly `amount` from
//! the sender into the native custody account, in the same critical
//! section that inserts the record. Settlement moves it back out to the
//! receiver (withdraw) or the sender (refund) as part of the state change.
//!
//! If the sender can't cover the deposit, the contract is never created and
//! the sender's balance is untouched. There is no "create, then refund on
//! failure" path.

use htlc_protocol::config::NATIVE_CUSTODY_ACCOUNT;
use htlc_protocol::vault::{BankError, NativeBank};
use htlc_protocol::Address;
use std::sync::Arc;
use tracing::warn;

use crate::error::HtlcError;
use crate::ledger::ContractLedger;
use crate::types::{Asset, ContractId, HtlcContract, NewContract, Preimage};

/// HTLCs funded with native value.
#[derive(Debug, Clone)]
pub struct NativeEscrow {
    ledger: Arc<ContractLedger>,
    bank: Arc<NativeBank>,
    custody: Address,
}

impl NativeEscrow {
    pub fn new(ledger: Arc<ContractLedger>, bank: Arc<NativeBank>) -> Self {
        Self {
            ledger,
            bank,
            custody: Address::from_static(NATIVE_CUSTODY_ACCOUNT),
        }
    }

    /// Lock `terms.amount` of `sender`'s native balance behind a hashlock.
    ///
    /// # Errors
    ///
    /// The ledger's creation errors, plus:
    /// - [`HtlcError::CustodyAccount`] if either party is the custody account.
    /// - [`HtlcError::InsufficientFunds`] when the sender can't cover `amount`.
    pub fn new_contract(
        &self,
        sender: &Address,
        terms: &NewContract,
    ) -> Result<ContractId, HtlcError> {
        self.ledger.check_custody(&self.custody, sender, terms)?;
        self.ledger
            .create(sender, Asset::Native, terms, |contract| {
                self.bank
                    .transfer(&contract.sender, &self.custody, contract.amount)
                    .map_err(deposit_error)
            })
    }

    /// Pay the contract out to its receiver by revealing the preimage.
    /// Returns the amount released.
    pub fn withdraw(
        &self,
        id: &ContractId,
        caller: &Address,
        preimage: &Preimage,
    ) -> Result<u64, HtlcError> {
        self.ledger
            .withdraw(id, caller, preimage, &Asset::Native, |contract| {
                self.release(contract, &contract.receiver)
            })
    }

    /// Return an expired contract's value to its sender.
    /// Returns the amount released.
    pub fn refund(&self, id: &ContractId, caller: &Address) -> Result<u64, HtlcError> {
        self.ledger
            .refund(id, caller, &Asset::Native, |contract| {
                self.release(contract, &contract.sender)
            })
    }

    pub fn get_contract(&self, id: &ContractId) -> Result<HtlcContract, HtlcError> {
        self.ledger.get(id)
    }

    pub fn custody(&self) -> &Address {
        &self.custody
    }

    pub fn bank(&self) -> &Arc<NativeBank> {
        &self.bank
    }

    fn release(&self, contract: &HtlcContract, to: &Address) -> Result<(), HtlcError> {
        self.bank
            .transfer(&self.custody, to, contract.amount)
            .map_err(|e| {
                warn!(contract = %contract.id, to = %to, error = %e, "native release failed");
                HtlcError::ExternalTransferFailed {
                    asset: Asset::Native,
                    reason: e.to_string(),
                }
            })
    }
}

fn deposit_error(error: BankError) -> HtlcError {
    match error {
        BankError::InsufficientFunds {
            account,
            available,
            requested,
        } => HtlcError::InsufficientFunds {
            account,
            available,
            requested,
        },
        other => HtlcError::ExternalTransferFailed {
            asset: Asset::Native,
            reason: other.to_string(),
        },
    }
}
