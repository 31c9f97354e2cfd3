use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use client_core::{default_keyfile, MarblesClient, Signer};
use shared::{domain::Marble, protocol::TransactionReceipt};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Provides subcommands to manage your marbles.
#[derive(Parser, Debug)]
#[command(name = "marbles", version)]
struct Cli {
    #[arg(long, env = "MARBLES_URL", default_value = "http://127.0.0.1:8008")]
    url: String,
    /// Key owner; selects ~/.sawtooth/keys/<username>.priv.
    #[arg(long, env = "MARBLES_USER", default_value = "jack")]
    username: String,
    #[arg(long)]
    keyfile: Option<PathBuf>,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Create a marble.
    Init {
        name: String,
        color: String,
        #[arg(allow_hyphen_values = true)]
        size: i64,
        owner: String,
    },
    /// Delete a marble.
    Delete { name: String },
    /// Show a marble.
    Read { name: String },
    /// Hand a marble to a new owner.
    Transfer { name: String, owner: String },
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn print_response(receipt: &TransactionReceipt) -> Result<()> {
    println!("Response: {}", serde_json::to_string(receipt)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose))),
        )
        .init();

    let keyfile = match cli.keyfile {
        Some(path) => path,
        None => default_keyfile(&cli.username)?,
    };
    debug!(keyfile = %keyfile.display(), url = %cli.url, "loading signer");
    let signer = Signer::load(&keyfile)?;
    let client = MarblesClient::new(&cli.url, &signer)?;

    match cli.command {
        Command::Init {
            name,
            color,
            size,
            owner,
        } => {
            let receipt = client
                .init(&Marble::new(name, color, size, owner))
                .await?;
            print_response(&receipt)?;
        }
        Command::Delete { name } => {
            let receipt = client.delete(&name).await?;
            print_response(&receipt)?;
        }
        Command::Read { name } => {
            let marble = client
                .read(&name)
                .await?
                .ok_or_else(|| anyhow!("Data not found: {name}"))?;
            let record = marble.to_record()?;
            println!("\n{name} Marble = {}\n", String::from_utf8_lossy(&record));
        }
        Command::Transfer { name, owner } => {
            let receipt = client.transfer(&name, &owner).await?;
            print_response(&receipt)?;
        }
    }

    Ok(())
}
