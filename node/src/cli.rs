//! # CLI Interface
//!
//! Command-line structure for `htlc-node`, via `clap` derive. Four
//! subcommands: `run`, `init`, `secret`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use htlc_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

/// HTLC escrow node.
///
/// Serves native and token hashed timelock contracts over HTTP, streams
/// contract events over WebSocket, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "htlc-node",
    about = "Hashed timelock contract escrow node",
    version,
    propagate_version = true
)]
pub struct HtlcNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create a data directory with a caller keypair and a sample genesis.
    Init(InitArgs),
    /// Print a fresh random preimage and its hashlock.
    Secret,
    /// Print version information and exit.
    Version,
}

/// Arguments for `run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP/WebSocket API.
    #[arg(long, env = "HTLC_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HTLC_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Genesis file (JSON) with initial native balances and tokens.
    ///
    /// Without one the node starts empty: no balances, no tokens.
    #[arg(long, short = 'g', env = "HTLC_GENESIS")]
    pub genesis: Option<PathBuf>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "HTLC_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for `init`.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize.
    #[arg(long, short = 'd', env = "HTLC_DATA_DIR", default_value = ".htlc")]
    pub data_dir: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}
