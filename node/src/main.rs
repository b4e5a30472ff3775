// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REMIT Node
//!
//! Entry point for the `remit-node` binary. Parses CLI arguments,
//! initializes logging, and runs the selected subcommand:
//!
//! - `simulate` — run request → approve/decline on an in-memory network
//! - `keygen`   — generate a party keypair
//! - `version`  — print build version information

mod cli;
mod logging;
mod metrics;
mod simulate;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use remit_protocol::identity::RemitKeypair;

use cli::{Commands, KeygenArgs, RemitNodeCli, SimulateArgs};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RemitNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Simulate(args) => run_simulation(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_simulation(args: SimulateArgs) -> Result<()> {
    let metrics = NodeMetrics::new().context("failed to create metrics registry")?;
    let report = simulate::run(&args, &metrics).await?;

    let rendered =
        serde_json::to_string_pretty(&report).context("failed to serialize simulation report")?;
    println!("{rendered}");

    if args.metrics {
        print!("{}", metrics.encode().context("failed to encode metrics")?);
    }
    Ok(())
}

fn keygen(args: KeygenArgs) -> Result<()> {
    let keypair = match args.secret_hex.as_deref() {
        Some(secret) => RemitKeypair::from_hex(secret).context("invalid --secret-hex")?,
        None => RemitKeypair::generate(),
    };
    let public_key = keypair.public_key();
    tracing::info!(public_key = %public_key, "keypair ready");

    let mut out = json!({
        "public_key_hex": public_key.to_hex(),
        "public_key_base58": public_key.to_base58(),
    });
    if args.show_secret {
        out["secret_key_hex"] = json!(hex::encode(keypair.secret_key_bytes()));
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("failed to serialize key")?
    );
    Ok(())
}

fn print_version() {
    println!("remit-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", remit_protocol::config::PROTOCOL_VERSION);
}
