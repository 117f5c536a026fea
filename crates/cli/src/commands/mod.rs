//! CLI commands module.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use herdledger_chain::{Ledger, LedgerConfig};
use herdledger_core::Block;
use std::fs;
use std::path::{Path, PathBuf};

mod asset;
mod block;
mod cert;
mod contract;
mod init;
mod status;

pub(crate) const CONFIG_FILE: &str = "config.json";

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ledger
    Init(init::InitArgs),
    /// Register, transfer and inspect cattle
    Asset(asset::AssetArgs),
    /// Breeding contracts
    Contract(contract::ContractArgs),
    /// Block operations
    Block(block::BlockArgs),
    /// Issue and verify certificates
    Cert(cert::CertArgs),
    /// Chain summary
    Status,
}

pub fn run(cmd: Commands, data_dir: &Path) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args, data_dir),
        Commands::Asset(args) => asset::run(args, data_dir),
        Commands::Contract(args) => contract::run(args, data_dir),
        Commands::Block(args) => block::run(args, data_dir),
        Commands::Cert(args) => cert::run(args, data_dir),
        Commands::Status => status::run(data_dir),
    }
}

/// Reward target for commands that mine.
#[derive(Args)]
pub(crate) struct MineOpts {
    /// Account credited with the mining reward
    #[arg(long, default_value = "miner")]
    miner: String,
}

pub(crate) fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

pub(crate) fn load_config(data_dir: &Path) -> Result<LedgerConfig> {
    let path = config_path(data_dir);
    let raw = fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read {}. Did you run 'herdledger init'?",
            path.display()
        )
    })?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))
}

pub(crate) fn open_ledger(data_dir: &Path) -> Result<Ledger> {
    let config = load_config(data_dir)?;
    tracing::debug!(path = %data_dir.display(), difficulty = config.difficulty, "opening ledger");
    Ledger::open(data_dir, config)
        .with_context(|| format!("Failed to open ledger at {}", data_dir.display()))
}

/// Mine the pending pool and report the new block.
pub(crate) fn mine(ledger: &Ledger, opts: &MineOpts) -> Result<Block> {
    let block = ledger
        .mine_block(&opts.miner)
        .context("Failed to mine block")?;
    print_mined(&block);
    Ok(block)
}

pub(crate) fn print_mined(block: &Block) {
    println!(
        "{}  Mined block {} {}",
        "✓".green().bold(),
        format!("#{}", block.index).bright_cyan(),
        short(&block.hash.to_hex()).bright_yellow()
    );
}

pub(crate) fn short(hex: &str) -> &str {
    &hex[..hex.len().min(16)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).is_err());

        let config = LedgerConfig {
            difficulty: 3,
            ..LedgerConfig::default()
        };
        fs::write(
            config_path(dir.path()),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        assert_eq!(load_config(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_open_ledger_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_ledger(dir.path()).err().unwrap();
        assert!(format!("{:#}", err).contains("herdledger init"));
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short(&"f".repeat(64)).len(), 16);
    }
}
