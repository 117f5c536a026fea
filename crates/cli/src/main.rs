//! herdledger CLI entry point.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "herdledger")]
#[command(about = "A cattle asset ledger on a proof-of-work hash chain", long_about = None)]
struct Cli {
    /// Directory holding the ledger database and config.json
    #[arg(short, long, global = true, default_value = "./herd_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd, &cli.data_dir) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("herdledger - A cattle asset ledger");
            println!("Run 'herdledger --help' for usage information.");
        }
    }
}
