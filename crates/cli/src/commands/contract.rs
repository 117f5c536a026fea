//! Breeding contract commands.

use super::{mine, open_ledger, MineOpts};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use colored::Colorize;
use herdledger_core::ContractStatus;
use std::path::Path;

#[derive(Args)]
pub struct ContractArgs {
    #[command(subcommand)]
    command: ContractCommand,
}

#[derive(Subcommand)]
enum ContractCommand {
    /// Open a breeding contract
    Create {
        contract_id: String,
        /// Sire asset id
        #[arg(long)]
        sire: String,
        /// Dam asset id
        #[arg(long)]
        dam: String,
        /// Expected birth date (YYYY-MM-DD)
        #[arg(long)]
        expected_date: NaiveDate,
        #[arg(long, default_value = "0")]
        reward: u64,
        #[command(flatten)]
        mine: MineOpts,
    },
    /// Complete a contract and register the offspring
    Execute {
        contract_id: String,
        offspring_id: String,
        #[command(flatten)]
        mine: MineOpts,
    },
    /// Show a contract
    Show { contract_id: String },
}

pub fn run(args: ContractArgs, data_dir: &Path) -> Result<()> {
    let ledger = open_ledger(data_dir)?;

    match args.command {
        ContractCommand::Create {
            contract_id,
            sire,
            dam,
            expected_date,
            reward,
            mine: opts,
        } => {
            ledger
                .create_contract(&contract_id, &sire, &dam, expected_date, reward)
                .with_context(|| format!("Failed to create contract {}", contract_id))?;
            mine(&ledger, &opts)?;
            println!(
                "{}  Contract {} created",
                "✓".green().bold(),
                contract_id.bright_cyan()
            );
        }
        ContractCommand::Execute {
            contract_id,
            offspring_id,
            mine: opts,
        } => {
            let executed = ledger
                .execute_contract(&contract_id, &offspring_id)
                .with_context(|| format!("Failed to execute contract {}", contract_id))?;
            if executed {
                mine(&ledger, &opts)?;
                println!(
                    "{}  Offspring {} registered",
                    "✓".green().bold(),
                    offspring_id.bright_cyan()
                );
            } else {
                println!(
                    "{}  Contract {} is already completed",
                    "!".yellow().bold(),
                    contract_id
                );
            }
        }
        ContractCommand::Show { contract_id } => {
            let contract = ledger
                .contract(&contract_id)?
                .with_context(|| format!("Contract not found: {}", contract_id))?;

            println!();
            println!("{}", "Contract Information:".bold().cyan());
            println!();
            println!("  Contract ID:   {}", contract.contract_id.bright_cyan());
            println!("  Sire:          {}", contract.party_a);
            println!("  Dam:           {}", contract.party_b);
            println!("  Expected:      {}", contract.expected_date);
            println!("  Reward:        {}", contract.reward);
            match &contract.status {
                ContractStatus::Active => println!("  Status:        {}", "active".green()),
                ContractStatus::Completed {
                    offspring_id,
                    completed_at,
                } => println!(
                    "  Status:        {} ({} on {})",
                    "completed".bright_black(),
                    offspring_id,
                    completed_at.format("%Y-%m-%d")
                ),
            }
            println!();
        }
    }

    ledger.close()?;
    Ok(())
}
