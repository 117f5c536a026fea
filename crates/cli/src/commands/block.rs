//! Block operations command.

use super::{open_ledger, print_mined, short};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use herdledger_core::{BlockPayload, CancelToken, Hash};
use std::path::Path;
use std::time::Duration;

#[derive(Args)]
pub struct BlockArgs {
    #[command(subcommand)]
    command: BlockCommand,
}

#[derive(Subcommand)]
enum BlockCommand {
    /// Mine a block from the pending pool
    Mine {
        /// Account credited with the mining reward
        #[arg(long, default_value = "miner")]
        miner: String,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// List recent blocks
    List {
        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
    /// Show detailed block information
    Info {
        /// Block number or hash (hex format)
        block_id: String,
    },
}

pub fn run(args: BlockArgs, data_dir: &Path) -> Result<()> {
    let ledger = open_ledger(data_dir)?;

    match args.command {
        BlockCommand::Mine {
            miner,
            timeout_secs,
        } => {
            let cancel = match timeout_secs {
                Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };
            let block = ledger
                .mine_block_with(&miner, &cancel)
                .context("Failed to mine block")?;
            print_mined(&block);
        }
        BlockCommand::List { count } => {
            let blocks = ledger.blocks()?;

            println!();
            println!("{}", "Recent Blocks:".bold().cyan());
            println!();

            for block in blocks.iter().rev().take(count) {
                println!(
                    "  {} {} {}",
                    format!("#{}", block.index).bright_black(),
                    short(&block.hash.to_hex()).bright_yellow(),
                    format!("({} txs)", block.tx_count()).bright_black()
                );
            }
            println!();
        }
        BlockCommand::Info { block_id } => {
            // Try parsing as an index first, then as a hash
            let found = if let Ok(index) = block_id.parse::<u64>() {
                ledger.block(index)?
            } else {
                let hash = Hash::from_hex(&block_id)
                    .with_context(|| format!("Invalid block hash: {}", block_id))?;
                ledger.blocks()?.into_iter().find(|b| b.hash == hash)
            };
            let block = found.context("Block not found")?;

            println!();
            println!("{}", "Block Information:".bold().cyan());
            println!();
            println!("  Index:        {}", block.index.to_string().bright_cyan());
            println!("  Hash:         {}", block.hash.to_hex().bright_yellow());
            println!(
                "  Parent Hash:  {}",
                block.previous_hash.to_hex().bright_black()
            );
            println!(
                "  Merkle Root:  {}",
                block.merkle_root.to_hex().bright_black()
            );
            println!("  Nonce:        {}", block.nonce);
            println!(
                "  Timestamp:    {}",
                block.timestamp.to_rfc3339().bright_black()
            );
            println!();

            match &block.payload {
                BlockPayload::Genesis(record) => {
                    println!("  {}", record.message.italic());
                    println!();
                }
                BlockPayload::Transactions(txs) => {
                    println!("{}", "Transactions:".bold());
                    println!();
                    for (i, tx) in txs.iter().enumerate() {
                        println!(
                            "  {} {} {:<14} {} → {} ({})",
                            format!("{}.", i + 1).bright_black(),
                            short(&tx.id.to_hex()).bright_yellow(),
                            tx.kind().to_string(),
                            tx.from,
                            tx.to,
                            tx.amount
                        );
                    }
                    println!();
                }
            }
        }
    }

    ledger.close()?;
    Ok(())
}
