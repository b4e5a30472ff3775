//! # CLI Interface
//!
//! Command-line arguments for `remit-node`, defined with `clap` derive.
//! Subcommands: `simulate`, `keygen`, `version`. Every tunable also reads a
//! `REMIT_*` environment variable.

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Upper bound accepted for `--validity-days`.
pub const MAX_VALIDITY_DAYS: i64 = 36_500;

/// REMIT node.
///
/// Runs transfer-request flows between parties on an in-process network
/// with its own notary, and provides key tooling.
#[derive(Parser, Debug)]
#[command(
    name = "remit-node",
    about = "REMIT transfer-request node",
    version,
    propagate_version = true
)]
pub struct RemitNodeCli {
    /// Log output format.
    #[arg(long, global = true, env = "REMIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, env = "REMIT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a request between two parties and resolve it.
    Simulate(SimulateArgs),
    /// Generate a party keypair and print its public key.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Names of the parties to start, comma separated.
    #[arg(
        long,
        env = "REMIT_PARTIES",
        value_delimiter = ',',
        default_value = "PartyA,PartyB,PartyC"
    )]
    pub parties: Vec<String>,

    /// Party asking for funds. Defaults to the first party.
    #[arg(long)]
    pub requester: Option<String>,

    /// Party asked to pay. Defaults to the second party.
    #[arg(long)]
    pub issuer: Option<String>,

    #[arg(long, default_value = "invoice")]
    pub title: String,

    #[arg(long, default_value = "simulated transfer request")]
    pub description: String,

    /// Amount requested.
    #[arg(long, default_value_t = 1000)]
    pub amount: i64,

    /// Approve the request for this amount.
    #[arg(long, conflicts_with = "decline")]
    pub approve: Option<i64>,

    /// Decline the request.
    #[arg(long)]
    pub decline: bool,

    /// Days a new request stays valid, up to 100 years.
    #[arg(
        long,
        env = "REMIT_REQUEST_VALIDITY_DAYS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=MAX_VALIDITY_DAYS)
    )]
    pub validity_days: i64,

    /// Per-message session receive timeout, in seconds.
    #[arg(long, env = "REMIT_SESSION_TIMEOUT_SECS", default_value_t = 30)]
    pub session_timeout_secs: u64,

    /// Print Prometheus metrics after the run.
    #[arg(long, env = "REMIT_METRICS")]
    pub metrics: bool,
}

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Derive the keypair from this hex-encoded 32-byte secret instead of
    /// generating a random one.
    #[arg(long, env = "REMIT_SECRET_KEY")]
    pub secret_hex: Option<String>,

    /// Also print the secret key.
    #[arg(long)]
    pub show_secret: bool,
}
