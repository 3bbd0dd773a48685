//! Validated party addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MAX_ADDRESS_LENGTH;

/// Reasons an address string is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must not be empty")]
    Empty,

    #[error("address is {length} characters, maximum is {max}")]
    TooLong { length: usize, max: usize },

    #[error("address contains whitespace or control characters")]
    InvalidCharacter,
}

/// A party identifier: sender, receiver, caller, token, or custody account.
///
/// Construction always validates, including when decoding from JSON, so an
/// `Address` in hand is never empty and never contains whitespace.
///
/// # Examples
///
/// ```
/// use htlc_protocol::Address;
///
/// let alice: Address = "alice".parse().unwrap();
/// assert_eq!(alice.as_str(), "alice");
/// assert!(Address::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AddressError::Empty);
        }
        if value.len() > MAX_ADDRESS_LENGTH {
            return Err(AddressError::TooLong {
                length: value.len(),
                max: MAX_ADDRESS_LENGTH,
            });
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AddressError::InvalidCharacter);
        }
        Ok(Self(value))
    }

    /// Address for a compile-time system account name, such as the custody
    /// accounts in [`config`](crate::config).
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid static address {value:?}");
        Self(value.to_owned())
    }

    /// The address controlled by an Ed25519 public key: its lowercase hex.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self(hex::encode(public_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}
