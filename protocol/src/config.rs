//! # Protocol Configuration & Constants
//!
//! Every magic number in the escrow lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! Some of these values are baked into contract identifiers and hashlocks.
//! Changing them after contracts exist orphans those contracts, so treat
//! the hashing section as frozen.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string of the escrow protocol.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Hashlocks are SHA-256 digests, for compatibility with every other chain
/// that speaks HTLC. A swap only works if both legs agree on the hash.
pub const HASHLOCK_ALGORITHM: &str = "SHA-256";

/// Digest length in bytes. Applies to hashlocks and contract identifiers.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Length of a secret preimage in bytes. 32 random bytes is 256 bits of
/// entropy, which is comfortably beyond brute force.
pub const PREIMAGE_LENGTH: usize = 32;

/// Separator byte between variable-length fields when deriving contract
/// identifiers. Prevents one field's suffix from masquerading as the next
/// field's prefix.
pub const FIELD_SEPARATOR: u8 = 0x00;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Maximum length of an address string. A hex Ed25519 public key is 64
/// characters; the headroom is for named system accounts.
pub const MAX_ADDRESS_LENGTH: usize = 128;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Escrow Custody Accounts
// ---------------------------------------------------------------------------

/// Account that holds native value while a native HTLC is active.
pub const NATIVE_CUSTODY_ACCOUNT: &str = "htlc:native-escrow";

/// Account that holds pulled tokens while a token HTLC is active. Senders
/// approve this account as spender before creating a token contract.
pub const TOKEN_CUSTODY_ACCOUNT: &str = "htlc:token-escrow";

// ---------------------------------------------------------------------------
// Node Parameters
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_RPC_PORT: u16 = 9741;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

/// Broadcast channel capacity for event streaming. Large enough to absorb
/// short bursts without dropping events for connected WebSocket clients.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Timelock window suggested by `htlc-node secret`.
/// One hour matches the usual first leg of a two-leg swap.
pub const DEFAULT_TIMELOCK_WINDOW: Duration = Duration::from_secs(3600);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_parameter_sizes() {
        assert_eq!(HASH_OUTPUT_LENGTH, 32);
        assert_eq!(PREIMAGE_LENGTH, 32);
        assert_eq!(PUBLIC_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
    }

    #[test]
    fn test_custody_accounts_are_distinct() {
        // Sharing custody between the escrows would let one escrow pay out
        // the other's deposits.
        assert_ne!(NATIVE_CUSTODY_ACCOUNT, TOKEN_CUSTODY_ACCOUNT);
        assert!(NATIVE_CUSTODY_ACCOUNT.len() <= MAX_ADDRESS_LENGTH);
        assert!(TOKEN_CUSTODY_ACCOUNT.len() <= MAX_ADDRESS_LENGTH);
    }

    #[test]
    fn test_default_ports_distinct() {
        assert_ne!(DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    }
}
