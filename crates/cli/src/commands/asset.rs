//! Asset commands.

use super::{mine, open_ledger, short, MineOpts};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use colored::Colorize;
use herdledger_chain::Ledger;
use herdledger_core::{AssetRecord, HealthEvent, HealthEventKind, NewAsset, OwnershipEntry};
use std::path::Path;

#[derive(Args)]
pub struct AssetArgs {
    #[command(subcommand)]
    command: AssetCommand,
}

#[derive(Subcommand)]
enum AssetCommand {
    /// Register a new animal
    Register {
        asset_id: String,
        #[arg(long)]
        breed: String,
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        location: String,
        /// Parent asset id (at most two)
        #[arg(long = "parent")]
        parents: Vec<String>,
        #[command(flatten)]
        mine: MineOpts,
    },
    /// Transfer ownership
    Transfer {
        asset_id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "0")]
        price: u64,
        #[command(flatten)]
        mine: MineOpts,
    },
    /// Record a health event
    Health {
        asset_id: String,
        /// vaccination, treatment, checkup or any other label
        #[arg(long)]
        kind: HealthEventKind,
        #[arg(long)]
        description: String,
        #[arg(long)]
        vet: String,
        #[command(flatten)]
        mine: MineOpts,
    },
    /// Show a record and its authenticity
    Show { asset_id: String },
    /// List registered asset ids
    List,
}

pub fn run(args: AssetArgs, data_dir: &Path) -> Result<()> {
    let ledger = open_ledger(data_dir)?;

    match args.command {
        AssetCommand::Register {
            asset_id,
            breed,
            birth_date,
            owner,
            location,
            parents,
            mine: opts,
        } => {
            let asset = NewAsset::new(&asset_id, breed, birth_date, owner, location)
                .with_parents(parents);
            ledger
                .register_asset(asset)
                .with_context(|| format!("Failed to register {}", asset_id))?;
            mine(&ledger, &opts)?;
            println!("{}  Registered {}", "✓".green().bold(), asset_id.bright_cyan());
        }
        AssetCommand::Transfer {
            asset_id,
            from,
            to,
            price,
            mine: opts,
        } => {
            ledger
                .transfer_ownership(&asset_id, &from, &to, price)
                .with_context(|| format!("Failed to transfer {}", asset_id))?;
            mine(&ledger, &opts)?;
            println!(
                "{}  {} transferred to {}",
                "✓".green().bold(),
                asset_id.bright_cyan(),
                to.bright_yellow()
            );
        }
        AssetCommand::Health {
            asset_id,
            kind,
            description,
            vet,
            mine: opts,
        } => {
            ledger
                .add_health_record(&asset_id, HealthEvent::new(kind, description, vet))
                .with_context(|| format!("Failed to record health event for {}", asset_id))?;
            mine(&ledger, &opts)?;
            println!("{}  Health event recorded", "✓".green().bold());
        }
        AssetCommand::Show { asset_id } => show(&ledger, &asset_id)?,
        AssetCommand::List => {
            let ids = ledger.asset_ids()?;
            println!();
            println!("{}", format!("Assets ({}):", ids.len()).bold().cyan());
            for id in ids {
                println!("  {}", id);
            }
            println!();
        }
    }

    ledger.close()?;
    Ok(())
}

fn show(ledger: &Ledger, asset_id: &str) -> Result<()> {
    let verification = ledger.verify_asset(asset_id)?;
    let record = ledger
        .asset(asset_id)?
        .with_context(|| format!("Asset not found: {}", asset_id))?;

    println!();
    println!("{}", "Asset Information:".bold().cyan());
    println!();
    print_record(&record);

    let authenticity = if verification.valid {
        "authentic".green().bold()
    } else {
        let reason = verification
            .reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        format!("FAILED ({})", reason).red().bold()
    };
    println!("  Authenticity:  {}", authenticity);
    println!();
    Ok(())
}

fn print_record(record: &AssetRecord) {
    println!("  Asset ID:      {}", record.asset_id.bright_cyan());
    println!("  Breed:         {}", record.breed);
    println!("  Birth Date:    {}", record.birth_date);
    println!("  Owner:         {}", record.owner_id.bright_yellow());
    println!("  Location:      {}", record.location);
    if !record.parent_ids.is_empty() {
        println!("  Parents:       {}", record.parent_ids.join(", "));
    }
    println!(
        "  Cert. Hash:    {}",
        short(&record.certification_hash.to_hex()).bright_black()
    );

    println!();
    println!("{}", "  Ownership History:".bold());
    for (i, entry) in record.ownership_history.iter().enumerate() {
        let line = match entry {
            OwnershipEntry::Initial(owner) => format!("{} (initial)", owner),
            OwnershipEntry::Transfer { owner, date, price } => {
                format!("{} on {} for {}", owner, date.format("%Y-%m-%d"), price)
            }
        };
        println!("    {} {}", format!("{}.", i + 1).bright_black(), line);
    }

    if !record.health_records.is_empty() {
        println!();
        println!("{}", "  Health Records:".bold());
        for event in &record.health_records {
            println!(
                "    {} {}: {} ({})",
                event.recorded_at.format("%Y-%m-%d").to_string().bright_black(),
                event.kind,
                event.description,
                event.veterinarian
            );
        }
    }
    println!();
}
