//! # HTLC Errors
//!
//! Every rejection carries the parameters that caused it. A failed
//! operation changes nothing: no record, no status flip, no moved value.

use htlc_protocol::Address;
use thiserror::Error;

use crate::types::{Asset, ContractId, Role, Settlement};

/// Errors from escrow operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HtlcError {
    #[error("invalid amount {amount}: must be greater than zero")]
    InvalidAmount { amount: u64 },

    #[error("invalid timelock {timelock}: must be after current time {now}")]
    InvalidTimelock { timelock: u64, now: u64 },

    #[error("invalid receiver {receiver}: sender cannot lock funds for itself")]
    InvalidReceiver { receiver: Address },

    #[error("{account} is an escrow custody account and cannot be a contract party")]
    CustodyAccount { account: Address },

    #[error("contract {id} already exists")]
    DuplicateContract { id: ContractId },

    #[error("contract {id} does not exist")]
    UnknownContract { id: ContractId },

    #[error("contract {id} already {state}")]
    AlreadySettled { id: ContractId, state: Settlement },

    #[error("{caller} is not the {required} of contract {id}")]
    Unauthorized {
        id: ContractId,
        caller: Address,
        required: Role,
    },

    #[error("preimage does not match the hashlock of contract {id}")]
    InvalidSecret { id: ContractId },

    #[error("contract {id} is locked until {timelock}, current time {now}")]
    TimelockNotExpired { id: ContractId, timelock: u64, now: u64 },

    #[error(
        "insufficient authorization on {token}: {owner} approved {allowance}, contract needs {requested}"
    )]
    InsufficientAuthorization {
        token: Address,
        owner: Address,
        allowance: u64,
        requested: u64,
    },

    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        available: u64,
        requested: u64,
    },

    #[error("{asset} transfer failed: {reason}")]
    ExternalTransferFailed { asset: Asset, reason: String },

    #[error("token {token} is not registered with this escrow")]
    UnknownToken { token: Address },

    #[error("contract {id} holds {found}, which this escrow does not manage")]
    AssetMismatch { id: ContractId, found: Asset },
}

impl HtlcError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            HtlcError::InvalidAmount { .. } => "invalid_amount",
            HtlcError::InvalidTimelock { .. } => "invalid_timelock",
            HtlcError::InvalidReceiver { .. } => "invalid_receiver",
            HtlcError::CustodyAccount { .. } => "custody_account",
            HtlcError::DuplicateContract { .. } => "duplicate_contract",
            HtlcError::UnknownContract { .. } => "unknown_contract",
            HtlcError::AlreadySettled { .. } => "already_settled",
            HtlcError::Unauthorized { .. } => "unauthorized",
            HtlcError::InvalidSecret { .. } => "invalid_secret",
            HtlcError::TimelockNotExpired { .. } => "timelock_not_expired",
            HtlcError::InsufficientAuthorization { .. } => "insufficient_authorization",
            HtlcError::InsufficientFunds { .. } => "insufficient_funds",
            HtlcError::ExternalTransferFailed { .. } => "external_transfer_failed",
            HtlcError::UnknownToken { .. } => "unknown_token",
            HtlcError::AssetMismatch { .. } => "asset_mismatch",
        }
    }
}
