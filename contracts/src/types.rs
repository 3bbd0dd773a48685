//! # HTLC Types
//!
//! Identifiers, the hashlock/preimage pair, the asset descriptor, and the
//! contract record itself.
//!
//! The record's lifecycle is an enum, not a pair of booleans:
//!
//! ```text
//!             withdraw(preimage)
//!   Active ───────────────────────▶ Withdrawn { preimage }
//!     │
//!     │       refund (after timelock)
//!     └───────────────────────────▶ Refunded
//! ```
//!
//! Both outcomes are terminal. "Withdrawn and refunded" and "secret set
//! while still active" simply have no representation.

use htlc_protocol::config::{FIELD_SEPARATOR, HASH_OUTPUT_LENGTH, PREIMAGE_LENGTH};
use htlc_protocol::crypto::{sha256_array, sha256_multi};
use htlc_protocol::Address;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// 32-byte hex newtypes
// ---------------------------------------------------------------------------

macro_rules! hex_bytes32 {
    ($name:ident, $len:expr) => {
        impl $name {
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex. An optional `0x` prefix is accepted.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut arr = [0u8; $len];
                hex::decode_to_slice(s, &mut arr)?;
                Ok(Self(arr))
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = hex::FromHexError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_hex(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

/// Content-addressed contract identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId([u8; HASH_OUTPUT_LENGTH]);

/// SHA-256 commitment to a secret preimage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hashlock([u8; HASH_OUTPUT_LENGTH]);

/// The secret that unlocks a hashlock.
///
/// `Debug` is redacted: a preimage is only public once a withdraw has
/// revealed it, and nothing that formats a pending request should leak it.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Preimage([u8; PREIMAGE_LENGTH]);

hex_bytes32!(ContractId, HASH_OUTPUT_LENGTH);
hex_bytes32!(Hashlock, HASH_OUTPUT_LENGTH);
hex_bytes32!(Preimage, PREIMAGE_LENGTH);

impl ContractId {
    /// Derive the id of a new contract.
    ///
    /// `sha256(sender ‖ 0x00 ‖ receiver ‖ 0x00 ‖ asset ‖ 0x00 ‖ amount ‖
    /// hashlock ‖ timelock ‖ created_at)`, integers big-endian. The
    /// separators keep variable-length addresses from bleeding into each
    /// other; everything after the asset is fixed width.
    pub fn derive(
        sender: &Address,
        receiver: &Address,
        asset: &Asset,
        amount: u64,
        hashlock: &Hashlock,
        timelock: u64,
        created_at: u64,
    ) -> Self {
        let sep = [FIELD_SEPARATOR];
        let descriptor = asset.descriptor();
        Self(sha256_multi(&[
            sender.as_bytes(),
            &sep,
            receiver.as_bytes(),
            &sep,
            &descriptor,
            &sep,
            &amount.to_be_bytes(),
            hashlock.as_bytes(),
            &timelock.to_be_bytes(),
            &created_at.to_be_bytes(),
        ]))
    }
}

impl Hashlock {
    pub fn from_preimage(preimage: &Preimage) -> Self {
        Self(sha256_array(preimage.as_bytes()))
    }

    /// Whether `preimage` hashes to this lock.
    pub fn is_unlocked_by(&self, preimage: &Preimage) -> bool {
        Self::from_preimage(preimage) == *self
    }
}

impl Preimage {
    /// 32 bytes from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; PREIMAGE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn hashlock(&self) -> Hashlock {
        Hashlock::from_preimage(self)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractId({})", self.to_hex())
    }
}

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashlock({})", self.to_hex())
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(..)")
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// What a contract holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "token", rename_all = "snake_case")]
pub enum Asset {
    /// Native value held by the native escrow.
    Native,
    /// A fungible token, identified by the token ledger's address.
    Token(Address),
}

impl Asset {
    /// Bytes fed into the contract id.
    pub fn descriptor(&self) -> Vec<u8> {
        match self {
            Asset::Native => b"native".to_vec(),
            Asset::Token(token) => {
                let mut out = b"token:".to_vec();
                out.extend_from_slice(token.as_bytes());
                out
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(token) => write!(f, "token:{token}"),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a contract is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContractState {
    Active,
    Withdrawn { preimage: Preimage },
    Refunded,
}

/// The two terminal outcomes, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    Withdrawn,
    Refunded,
}

impl ContractState {
    /// `None` while active.
    pub fn settlement(&self) -> Option<Settlement> {
        match self {
            ContractState::Active => None,
            ContractState::Withdrawn { .. } => Some(Settlement::Withdrawn),
            ContractState::Refunded => Some(Settlement::Refunded),
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractState::Active => write!(f, "Active"),
            ContractState::Withdrawn { .. } => write!(f, "Withdrawn"),
            ContractState::Refunded => write!(f, "Refunded"),
        }
    }
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::Withdrawn => write!(f, "withdrawn"),
            Settlement::Refunded => write!(f, "refunded"),
        }
    }
}

/// Which party an operation is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => write!(f, "sender"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

// ---------------------------------------------------------------------------
// Contract record
// ---------------------------------------------------------------------------

/// Terms the sender supplies when creating a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContract {
    pub receiver: Address,
    pub amount: u64,
    pub hashlock: Hashlock,
    /// Absolute Unix seconds.
    pub timelock: u64,
}

/// A hashed timelock contract.
///
/// Snapshots handed out by the ledger are copies; editing one changes
/// nothing on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcContract {
    pub id: ContractId,
    /// Funded the contract; the only party that can refund it.
    pub sender: Address,
    /// The only party that can withdraw.
    pub receiver: Address,
    pub asset: Asset,
    pub amount: u64,
    pub hashlock: Hashlock,
    /// Absolute Unix seconds after which the sender may refund.
    pub timelock: u64,
    /// Creation time, Unix seconds. Part of the id.
    pub created_at: u64,
    pub state: ContractState,
}

impl HtlcContract {
    pub fn is_active(&self) -> bool {
        matches!(self.state, ContractState::Active)
    }

    pub fn withdrawn(&self) -> bool {
        matches!(self.state, ContractState::Withdrawn { .. })
    }

    pub fn refunded(&self) -> bool {
        matches!(self.state, ContractState::Refunded)
    }

    /// The revealed preimage, once withdrawn.
    pub fn secret(&self) -> Option<&Preimage> {
        match &self.state {
            ContractState::Withdrawn { preimage } => Some(preimage),
            _ => None,
        }
    }

    pub fn involves(&self, address: &Address) -> bool {
        self.sender == *address || self.receiver == *address
    }
}
