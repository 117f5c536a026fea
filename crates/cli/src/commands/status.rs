//! Chain status command.

use super::{open_ledger, short};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn run(data_dir: &Path) -> Result<()> {
    let ledger = open_ledger(data_dir)?;
    let status = ledger.chain_status()?;

    println!();
    println!("{}", "Chain Status:".bold().cyan());
    println!();
    println!("  Length:       {}", status.length.to_string().bright_cyan());
    println!(
        "  Latest Hash:  {}",
        short(&status.latest_hash.to_hex()).bright_yellow()
    );
    println!("  Difficulty:   {}", status.difficulty);
    println!("  Pending:      {}", status.pending_count);
    println!("  Assets:       {}", ledger.asset_ids()?.len());
    println!("  Contracts:    {}", ledger.contract_ids()?.len());

    match ledger.validate_chain() {
        Ok(()) => println!("  Integrity:    {}", "valid".green().bold()),
        Err(err) => println!("  Integrity:    {} ({})", "INVALID".red().bold(), err),
    }
    println!();

    ledger.close()?;
    Ok(())
}
