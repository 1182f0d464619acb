//! Talita CLI
//!
//! Exchange RSA public keys with another device by QR code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use talita_cli::contacts_cmd::{self, ContactsAction};
use talita_cli::handshake_cmd::{self, AcceptArgs, PairArgs, ShowArgs};
use talita_core::config::load_config;
use talita_core::tracing_init::{default_filter, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "talita")]
#[command(version, about = "Exchange public keys by QR code", long_about = None)]
struct Cli {
    /// Settings file, read after the global one.
    #[arg(long, global = true, env = "TALITA_CONFIG")]
    config: Option<PathBuf>,

    /// Emit structured JSON log lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Contact store file.
    #[arg(long, global = true)]
    contacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show this device's QR code, payload and fingerprint.
    Show(ShowArgs),
    /// Print this device's payload text only.
    Payload,
    /// Accept a peer's payload and store it as a contact.
    Accept(AcceptArgs),
    /// Show this device's code, then accept the peer's from stdin.
    Pair(PairArgs),
    /// Manage stored contacts.
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.json_logs {
        config.log.json = true;
    }
    if let Some(path) = cli.contacts {
        config.contacts.path = Some(path);
    }

    init_tracing(&default_filter(&config.log.level), config.log.json);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        strength = %config.keys.strength,
        level = %config.code.error_correction,
        "Starting talita"
    );

    match cli.command {
        Commands::Show(args) => handshake_cmd::show(&args, &config),
        Commands::Payload => handshake_cmd::payload(&config),
        Commands::Accept(args) => handshake_cmd::accept(args, &config),
        Commands::Pair(args) => handshake_cmd::pair(&args, &config),
        Commands::Contacts { action } => contacts_cmd::run(action, &config),
    }
}
