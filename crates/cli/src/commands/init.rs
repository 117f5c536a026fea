//! Initialize ledger command.

use super::config_path;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use herdledger_chain::{KeyPolicy, Ledger, LedgerConfig, OwnershipPolicy};
use std::fs;
use std::path::Path;

#[derive(Args)]
pub struct InitArgs {
    /// Proof-of-work difficulty (leading zero hex digits)
    #[arg(long, default_value = "2")]
    difficulty: usize,

    /// Reward paid for each mined block
    #[arg(long, default_value = "10")]
    mining_reward: u64,

    /// Reject transfers whose sender is not the recorded owner
    #[arg(long)]
    strict_ownership: bool,

    /// Do not store the certificate key; certificates die with each process
    #[arg(long)]
    ephemeral_certificates: bool,
}

pub fn run(args: InitArgs, data_dir: &Path) -> Result<()> {
    println!("{}", "Initializing herdledger...".bold().cyan());
    println!();

    let config_file = config_path(data_dir);
    if config_file.exists() {
        bail!("Ledger already initialized at {}", data_dir.display());
    }

    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    println!("{}  Created data directory", "✓".green().bold());

    let config = LedgerConfig {
        difficulty: args.difficulty,
        mining_reward: args.mining_reward,
        ownership_policy: if args.strict_ownership {
            OwnershipPolicy::Strict
        } else {
            OwnershipPolicy::Permissive
        },
        certificate_keys: if args.ephemeral_certificates {
            KeyPolicy::Ephemeral
        } else {
            KeyPolicy::Persisted
        },
        ..LedgerConfig::default()
    };

    let ledger = Ledger::open(data_dir, config.clone())
        .with_context(|| "Failed to initialize ledger")?;
    let genesis = ledger.latest_block()?;
    ledger.close()?;

    println!("{}  Created genesis block", "✓".green().bold());
    println!("    Hash: {}", genesis.hash.to_hex().bright_yellow());
    println!("    Nonce: {}", genesis.nonce.to_string().bright_cyan());

    fs::write(&config_file, serde_json::to_string_pretty(&config)?)?;
    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        config_file.display().to_string().bright_black()
    );

    println!();
    println!("{}", "Ledger initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  • Use {} to add cattle",
        "herdledger asset register".bright_cyan()
    );
    println!(
        "  • Use {} to issue certificates",
        "herdledger cert issue".bright_cyan()
    );
    println!(
        "  • Use {} to explore blocks",
        "herdledger block list".bright_cyan()
    );

    Ok(())
}
