//! # Genesis
//!
//! Initial balances for a fresh node, loaded from JSON:
//!
//! ```json
//! {
//!   "native": { "<address>": 1000000 },
//!   "tokens": [
//!     { "address": "usd", "balances": { "<address>": 5000 } }
//!   ]
//! }
//! ```
//!
//! Native amounts are credited to the node's [`NativeBank`]. Each token
//! becomes a [`FungibleToken`] registered with the token escrow.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use htlc_contracts::TokenEscrow;
use htlc_protocol::vault::{FungibleToken, NativeBank};
use htlc_protocol::Address;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    #[serde(default)]
    pub native: BTreeMap<Address, u64>,
    #[serde(default)]
    pub tokens: Vec<GenesisToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisToken {
    pub address: Address,
    #[serde(default)]
    pub balances: BTreeMap<Address, u64>,
}

impl Genesis {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read genesis file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse genesis file {}", path.display()))
    }

    /// Sample genesis written by `htlc-node init`: one funded account with
    /// native value and a `usd` token.
    pub fn sample(account: &Address) -> Self {
        let mut native = BTreeMap::new();
        native.insert(account.clone(), 1_000_000);
        let mut balances = BTreeMap::new();
        balances.insert(account.clone(), 1_000_000);
        Self {
            native,
            tokens: vec![GenesisToken {
                address: Address::from_static("usd"),
                balances,
            }],
        }
    }

    /// Credit native balances and create, mint, and register every token.
    /// Returns the token handles keyed by address.
    pub fn apply(
        &self,
        bank: &NativeBank,
        escrow: &TokenEscrow,
    ) -> Result<HashMap<Address, Arc<FungibleToken>>> {
        for (account, amount) in &self.native {
            bank.credit(account, *amount)
                .with_context(|| format!("genesis credit to {account}"))?;
        }

        let mut tokens = HashMap::with_capacity(self.tokens.len());
        for entry in &self.tokens {
            if tokens.contains_key(&entry.address) {
                bail!("token {} listed twice in genesis", entry.address);
            }
            let token = Arc::new(FungibleToken::new(entry.address.clone()));
            for (account, amount) in &entry.balances {
                token
                    .mint(account, *amount)
                    .with_context(|| format!("genesis mint of {} to {account}", entry.address))?;
            }
            escrow.register_token(token.clone());
            tokens.insert(entry.address.clone(), token);
        }

        tracing::info!(
            accounts = self.native.len(),
            tokens = tokens.len(),
            "genesis applied"
        );
        Ok(tokens)
    }
}
