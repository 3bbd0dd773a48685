// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HTLC Escrow Node
//!
//! Entry point for the `htlc-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and serves the escrows over HTTP/WS.
//!
//! The binary supports four subcommands:
//!
//! - `run`     start the node
//! - `init`    create a data directory with a caller key and sample genesis
//! - `secret`  print a fresh preimage, its hashlock, and a suggested timelock
//! - `version` print build version information

mod api;
mod auth;
mod cli;
mod genesis;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use htlc_contracts::Preimage;
use htlc_protocol::config::DEFAULT_TIMELOCK_WINDOW;
use htlc_protocol::crypto::HtlcKeypair;
use htlc_protocol::{Address, Clock, SystemClock};

use cli::{Commands, HtlcNodeCli};
use genesis::Genesis;
use logging::LogFormat;
use metrics::NodeMetrics;

const KEY_FILE: &str = "caller.key";
const GENESIS_FILE: &str = "genesis.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HtlcNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Secret => {
            print_secret();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_DIRECTIVES,
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        genesis = ?args.genesis,
        "starting htlc-node"
    );

    let genesis = match &args.genesis {
        Some(path) => Genesis::load(path)?,
        None => Genesis::default(),
    };

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState::build(
        Arc::new(SystemClock),
        Arc::clone(&node_metrics),
        &genesis,
    )?;

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("htlc-node stopped");
    Ok(())
}

/// What `init` wrote.
#[derive(Debug)]
struct InitOutcome {
    key_path: PathBuf,
    genesis_path: PathBuf,
    address: Address,
}

/// Initializes a data directory with a caller keypair and a genesis file
/// funding it.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("htlc_node=info", LogFormat::Pretty);
    tracing::info!(data_dir = %args.data_dir.display(), "initializing node");

    let outcome = write_data_dir(&args.data_dir, &HtlcKeypair::generate(), args.force)?;

    tracing::info!(
        address = %outcome.address,
        key_path = %outcome.key_path.display(),
        "caller keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Caller key     : {}", outcome.key_path.display());
    println!("  Address        : {}", outcome.address);
    println!("  Genesis        : {}", outcome.genesis_path.display());
    println!();
    println!(
        "Start with: htlc-node run --genesis {}",
        outcome.genesis_path.display()
    );

    Ok(())
}

fn write_data_dir(data_dir: &Path, keypair: &HtlcKeypair, force: bool) -> Result<InitOutcome> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = data_dir.join(KEY_FILE);
    if key_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            key_path.display()
        );
    }
    write_secret(&key_path, keypair.secret_key_hex().as_bytes())
        .with_context(|| format!("failed to write caller key to {}", key_path.display()))?;

    let address = keypair.address();
    let genesis_path = data_dir.join(GENESIS_FILE);
    let genesis = serde_json::to_vec_pretty(&Genesis::sample(&address))?;
    std::fs::write(&genesis_path, genesis)
        .with_context(|| format!("failed to write genesis to {}", genesis_path.display()))?;

    Ok(InitOutcome {
        key_path,
        genesis_path,
        address,
    })
}

/// Writes `contents` to a file that is owner-only from the moment it exists.
/// An existing file keeps its mode, so it is tightened as well.
fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)
    }
    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(contents)
    }
}

/// Prints a fresh preimage, its hashlock, and a timelock one default window
/// from now.
fn print_secret() {
    let preimage = Preimage::random();
    println!("preimage {}", preimage.to_hex());
    println!("hashlock {}", preimage.hashlock().to_hex());
    println!("timelock {}", suggested_timelock(SystemClock.now()));
}

fn suggested_timelock(now: u64) -> u64 {
    now.saturating_add(DEFAULT_TIMELOCK_WINDOW.as_secs())
}

/// Prints version information to stdout.
fn print_version() {
    println!("htlc-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", htlc_protocol::config::PROTOCOL_VERSION);
    println!("hashlock  {}", htlc_protocol::config::HASHLOCK_ALGORITHM);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler can't be
/// installed that branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
