//! wg-inspect: Wallet-Guard diagnostics
//!
//! Offline checks for support and incident work: run the provider assessment
//! on a captured descriptor, produce or check sign-in messages, and read
//! audit log exports.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wg_telemetry::{init_logging, TelemetryConfig};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "wg-inspect")]
#[command(about = "Diagnostics for Wallet-Guard connection security")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Security configuration (JSON); defaults come from the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assess a captured provider descriptor
    Assess {
        /// Descriptor JSON file
        descriptor: PathBuf,

        /// Public key seen on the previous connection
        #[arg(long)]
        previous_key: Option<String>,

        /// Also check the shape against this wallet's expectations
        #[arg(long)]
        wallet: Option<String>,

        /// Treat the page as running inside an iframe
        #[arg(long)]
        nested: bool,

        /// Print the full assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a sign-in message for a public key
    AuthMessage {
        /// Base58 wallet public key
        public_key: String,
    },

    /// Verify an Ed25519 signature over a message file
    Verify {
        /// File holding the exact signed text
        #[arg(long)]
        message: PathBuf,

        /// Base58 signature
        #[arg(long)]
        signature: String,

        /// Base58 public key
        #[arg(long)]
        public_key: String,
    },

    /// Summarize an audit log export
    Audit {
        /// Export JSON file (array of audit entries)
        export: PathBuf,

        /// Only entries for this wallet
        #[arg(long)]
        wallet: Option<String>,

        /// Only failed entries
        #[arg(long)]
        failures: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::for_tool("inspect");
    if cli.verbose {
        telemetry = telemetry.with_log_level("debug");
    }
    init_logging(&telemetry)?;

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Assess {
            descriptor,
            previous_key,
            wallet,
            nested,
            json,
        } => commands::assess(
            config,
            &descriptor,
            previous_key.as_deref(),
            wallet.as_deref(),
            nested,
            json,
        ),
        Commands::AuthMessage { public_key } => commands::auth_message(config, &public_key),
        Commands::Verify {
            message,
            signature,
            public_key,
        } => commands::verify(&message, &signature, &public_key),
        Commands::Audit {
            export,
            wallet,
            failures,
        } => commands::audit(&export, wallet.as_deref(), failures),
    }
}
