//! # Contract Ledger
//!
//! The authoritative `id → contract` table, shared by the native and token
//! escrows.
//!
//! ## Concurrency
//!
//! The table is a `DashMap`, so each record sits behind its shard's lock.
//! Every operation follows the same discipline inside that one critical
//! section:
//!
//! ```text
//! read → validate → move value (escrow callback) → commit → publish event
//! ```
//!
//! The escrow's value-moving callback runs *before* the new state is
//! written and while the record is still locked. If it fails, nothing is
//! committed and the record stays `Active`. If it succeeds, the commit
//! cannot fail. Nobody, including the callback itself, can ever observe a
//! record whose funds have left custody but whose state still says
//! `Active`, so there is no window in which a second withdraw or refund
//! could pay out again.
//!
//! Callbacks and event sinks run under the lock and must not call back
//! into the ledger.
//!
//! ## Time
//!
//! Timelocks are compared against the ledger's [`Clock`]. No operation
//! accepts a caller-supplied "now".

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use htlc_protocol::{Address, Clock, SystemClock};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::HtlcError;
use crate::events::{EventSink, HtlcEvent, NullSink};
use crate::types::{
    Asset, ContractId, ContractState, HtlcContract, NewContract, Preimage, Role,
};

/// The contract table.
pub struct ContractLedger {
    contracts: DashMap<ContractId, HtlcContract>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl Default for ContractLedger {
    /// Wall-clock time, events discarded.
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(NullSink))
    }
}

impl std::fmt::Debug for ContractLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractLedger")
            .field("contracts", &self.contracts.len())
            .finish_non_exhaustive()
    }
}

impl ContractLedger {
    pub fn new(clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            contracts: DashMap::new(),
            clock,
            events,
        }
    }

    /// The ledger's current time.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an `Active` contract funded by `sender`.
    ///
    /// `fund` is the escrow's deposit step (take native value, pull tokens).
    /// It runs after validation and the duplicate check, with the new id's
    /// slot locked. The record is inserted only if `fund` succeeds, so a
    /// rejected creation leaves both the ledger and the sender's balance
    /// untouched.
    ///
    /// # Errors
    ///
    /// - [`HtlcError::InvalidReceiver`] if `receiver == sender`.
    /// - [`HtlcError::InvalidAmount`] if `amount == 0`.
    /// - [`HtlcError::InvalidTimelock`] if `timelock <= now`.
    /// - [`HtlcError::DuplicateContract`] if the derived id exists.
    /// - Whatever `fund` returns.
    pub fn create<F>(
        &self,
        sender: &Address,
        asset: Asset,
        terms: &NewContract,
        fund: F,
    ) -> Result<ContractId, HtlcError>
    where
        F: FnOnce(&HtlcContract) -> Result<(), HtlcError>,
    {
        let now = self.clock.now();

        if terms.receiver == *sender {
            return Err(self.reject(
                "create",
                HtlcError::InvalidReceiver {
                    receiver: terms.receiver.clone(),
                },
            ));
        }
        if terms.amount == 0 {
            return Err(self.reject(
                "create",
                HtlcError::InvalidAmount {
                    amount: terms.amount,
                },
            ));
        }
        if terms.timelock <= now {
            return Err(self.reject(
                "create",
                HtlcError::InvalidTimelock {
                    timelock: terms.timelock,
                    now,
                },
            ));
        }

        let id = ContractId::derive(
            sender,
            &terms.receiver,
            &asset,
            terms.amount,
            &terms.hashlock,
            terms.timelock,
            now,
        );

        let slot = match self.contracts.entry(id) {
            Entry::Occupied(_) => {
                return Err(self.reject("create", HtlcError::DuplicateContract { id }));
            }
            Entry::Vacant(slot) => slot,
        };

        let contract = HtlcContract {
            id,
            sender: sender.clone(),
            receiver: terms.receiver.clone(),
            asset,
            amount: terms.amount,
            hashlock: terms.hashlock,
            timelock: terms.timelock,
            created_at: now,
            state: ContractState::Active,
        };

        fund(&contract).map_err(|e| self.reject("create", e))?;

        let event = HtlcEvent::Created {
            id,
            sender: contract.sender.clone(),
            receiver: contract.receiver.clone(),
            asset: contract.asset.clone(),
            amount: contract.amount,
            hashlock: contract.hashlock,
            timelock: contract.timelock,
        };
        info!(
            contract = %id,
            sender = %contract.sender,
            receiver = %contract.receiver,
            asset = %contract.asset,
            amount = contract.amount,
            timelock = contract.timelock,
            "contract created"
        );

        let inserted = slot.insert(contract);
        self.events.publish(&event);
        drop(inserted);

        Ok(id)
    }

    /// Reject terms that name an escrow's own custody account as a party.
    ///
    /// A deposit from custody to custody moves nothing, so such a record
    /// would be a claim on value that belongs to other contracts.
    pub(crate) fn check_custody(
        &self,
        custody: &Address,
        sender: &Address,
        terms: &NewContract,
    ) -> Result<(), HtlcError> {
        for party in [sender, &terms.receiver] {
            if party == custody {
                return Err(self.reject(
                    "create",
                    HtlcError::CustodyAccount {
                        account: party.clone(),
                    },
                ));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Settle a contract to its receiver by revealing the preimage.
    ///
    /// Checks, in order: the contract exists; it holds `asset`; `preimage`
    /// hashes to the hashlock; it is still `Active`; `caller` is the
    /// receiver. There is no timelock check. A valid reveal after expiry
    /// still wins as long as nobody has refunded first.
    ///
    /// `release` pays the receiver. The state becomes `Withdrawn` only if
    /// it succeeds. Returns the released amount.
    pub fn withdraw<F>(
        &self,
        id: &ContractId,
        caller: &Address,
        preimage: &Preimage,
        asset: &Asset,
        release: F,
    ) -> Result<u64, HtlcError>
    where
        F: FnOnce(&HtlcContract) -> Result<(), HtlcError>,
    {
        let mut entry = self
            .contracts
            .get_mut(id)
            .ok_or_else(|| self.reject("withdraw", HtlcError::UnknownContract { id: *id }))?;
        let contract = entry.value_mut();

        check_asset(contract, asset).map_err(|e| self.reject("withdraw", e))?;
        if !contract.hashlock.is_unlocked_by(preimage) {
            return Err(self.reject("withdraw", HtlcError::InvalidSecret { id: *id }));
        }
        check_active(contract).map_err(|e| self.reject("withdraw", e))?;
        if contract.receiver != *caller {
            return Err(self.reject(
                "withdraw",
                HtlcError::Unauthorized {
                    id: *id,
                    caller: caller.clone(),
                    required: Role::Receiver,
                },
            ));
        }

        release(&*contract).map_err(|e| self.reject("withdraw", e))?;

        contract.state = ContractState::Withdrawn {
            preimage: *preimage,
        };
        let amount = contract.amount;
        info!(
            contract = %id,
            receiver = %contract.receiver,
            amount,
            late = self.clock.now() >= contract.timelock,
            "contract withdrawn"
        );
        self.events.publish(&HtlcEvent::Withdrawn {
            id: *id,
            preimage: *preimage,
        });
        drop(entry);

        Ok(amount)
    }

    /// Return an expired contract's funds to its sender.
    ///
    /// Checks, in order: the contract exists; it holds `asset`; it is still
    /// `Active`; the timelock has passed (regardless of who is asking);
    /// `caller` is the sender.
    ///
    /// `release` pays the sender. The state becomes `Refunded` only if it
    /// succeeds. Returns the released amount.
    pub fn refund<F>(
        &self,
        id: &ContractId,
        caller: &Address,
        asset: &Asset,
        release: F,
    ) -> Result<u64, HtlcError>
    where
        F: FnOnce(&HtlcContract) -> Result<(), HtlcError>,
    {
        let mut entry = self
            .contracts
            .get_mut(id)
            .ok_or_else(|| self.reject("refund", HtlcError::UnknownContract { id: *id }))?;
        let contract = entry.value_mut();

        check_asset(contract, asset).map_err(|e| self.reject("refund", e))?;
        check_active(contract).map_err(|e| self.reject("refund", e))?;
        let now = self.clock.now();
        if now < contract.timelock {
            return Err(self.reject(
                "refund",
                HtlcError::TimelockNotExpired {
                    id: *id,
                    timelock: contract.timelock,
                    now,
                },
            ));
        }
        if contract.sender != *caller {
            return Err(self.reject(
                "refund",
                HtlcError::Unauthorized {
                    id: *id,
                    caller: caller.clone(),
                    required: Role::Sender,
                },
            ));
        }

        release(&*contract).map_err(|e| self.reject("refund", e))?;

        contract.state = ContractState::Refunded;
        let amount = contract.amount;
        info!(contract = %id, sender = %contract.sender, amount, "contract refunded");
        self.events.publish(&HtlcEvent::Refunded { id: *id });
        drop(entry);

        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshot of a contract.
    pub fn get(&self, id: &ContractId) -> Result<HtlcContract, HtlcError> {
        self.contracts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(HtlcError::UnknownContract { id: *id })
    }

    pub fn contains(&self, id: &ContractId) -> bool {
        self.contracts.contains_key(id)
    }

    /// Every contract where `address` is sender or receiver, oldest first.
    pub fn contracts_for(&self, address: &Address) -> Vec<HtlcContract> {
        let mut found: Vec<HtlcContract> = self
            .contracts
            .iter()
            .filter(|entry| entry.value().involves(address))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }

    /// Number of contracts still `Active`.
    pub fn active_count(&self) -> usize {
        self.contracts
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    fn reject(&self, operation: &'static str, error: HtlcError) -> HtlcError {
        debug!(operation, kind = error.kind(), %error, "rejected");
        error
    }
}

fn check_asset(contract: &HtlcContract, expected: &Asset) -> Result<(), HtlcError> {
    if contract.asset != *expected {
        return Err(HtlcError::AssetMismatch {
            id: contract.id,
            found: contract.asset.clone(),
        });
    }
    Ok(())
}

fn check_active(contract: &HtlcContract) -> Result<(), HtlcError> {
    match contract.state.settlement() {
        None => Ok(()),
        Some(state) => Err(HtlcError::AlreadySettled {
            id: contract.id,
            state,
        }),
    }
}
