//! Certificate commands.

use super::open_ledger;
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::Path;

#[derive(Args)]
pub struct CertArgs {
    #[command(subcommand)]
    command: CertCommand,
}

#[derive(Subcommand)]
enum CertCommand {
    /// Issue a certificate for an asset
    Issue {
        asset_id: String,
        /// Skip the QR code
        #[arg(long)]
        no_qr: bool,
    },
    /// Verify a certificate string
    Verify { certificate: String },
}

pub fn run(args: CertArgs, data_dir: &Path) -> Result<()> {
    let ledger = open_ledger(data_dir)?;

    match args.command {
        CertCommand::Issue { asset_id, no_qr } => {
            let Some(cert) = ledger.issue_certificate(&asset_id)? else {
                let reason = ledger
                    .verify_asset(&asset_id)?
                    .reason
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                bail!("Cannot certify {}: {}", asset_id, reason);
            };

            println!();
            println!("{}", "Certificate Issued:".bold().cyan());
            println!();
            println!("  Certificate ID: {}", cert.certificate_id.bright_yellow());
            println!("  Asset:          {}", cert.payload.asset_id.bright_cyan());
            println!("  Owner:          {}", cert.payload.owner_id);
            println!();
            println!("{}", cert.certificate);
            if !no_qr {
                println!();
                println!("{}", cert.qr_code);
            }
            println!();
        }
        CertCommand::Verify { certificate } => {
            let result = ledger.verify_certificate(&certificate)?;

            println!();
            if result.valid {
                println!("{}  Certificate is valid", "✓".green().bold());
            } else {
                println!(
                    "{}  Certificate is invalid: {}",
                    "✗".red().bold(),
                    result.reason.unwrap_or_default()
                );
            }
            if let Some(payload) = result.payload {
                println!("  Certificate ID: {}", payload.certificate_id.bright_yellow());
                println!("  Asset:          {}", payload.asset_id.bright_cyan());
                println!("  Breed:          {}", payload.breed);
                println!("  Owner at issue: {}", payload.owner_id);
                println!("  Issued:         {}", payload.issued_at.to_rfc3339());
            }
            println!();
        }
    }

    ledger.close()?;
    Ok(())
}
