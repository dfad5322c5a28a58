//! savsync CLI
//!
//! Command-line frontend for the save-record codec and sync engine.
//!
//! # Commands
//!
//! - `encode` - Encrypt a plaintext record into a sav blob
//! - `decode` - Decrypt a sav blob into its plaintext form
//! - `sweep` - Run one synchronization pass over a save root
//! - `watch` - Run the background worker until interrupted

use clap::{Parser, Subcommand};
use savsync_codec::{decode_save, derive_account_key, encode_save, AccountKey};
use savsync_engine::{Debouncer, SyncConfig, SyncEngine, SyncError};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Save-record codec and synchronization tools.
#[derive(Parser)]
#[command(name = "savsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a plaintext record into a sav blob
    Encode {
        /// Account identifier the key is derived from
        account: String,

        /// Input plaintext file
        input: PathBuf,

        /// Output blob file
        output: PathBuf,
    },

    /// Decrypt a sav blob into its plaintext form
    Decode {
        /// Account identifier the key is derived from
        account: String,

        /// Input blob file
        input: PathBuf,

        /// Output plaintext file
        output: PathBuf,
    },

    /// Run one synchronization pass over every account under a save root
    Sweep {
        /// Save root directory (one subdirectory per account)
        root: PathBuf,

        /// Relative records subdirectory within each account root
        #[arg(long, default_value = "")]
        records_subdir: PathBuf,
    },

    /// Run the background worker until interrupted
    Watch {
        /// Save root directory (one subdirectory per account)
        root: PathBuf,

        /// Relative records subdirectory within each account root
        #[arg(long, default_value = "")]
        records_subdir: PathBuf,

        /// Debounce delay in milliseconds
        #[arg(long, default_value_t = 50)]
        debounce_ms: u64,
    },
}

fn key_for(account: &str) -> Result<AccountKey, SyncError> {
    derive_account_key(account).ok_or_else(|| SyncError::KeyDerivation {
        account: account.into(),
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Encode {
            account,
            input,
            output,
        } => {
            let key = key_for(&account)?;
            let plaintext = std::fs::read(&input)?;
            let blob = encode_save(&plaintext, &key)?;
            std::fs::write(&output, blob)?;
        }
        Commands::Decode {
            account,
            input,
            output,
        } => {
            let key = key_for(&account)?;
            let blob = std::fs::read(&input)?;
            let plaintext = decode_save(&blob, &key)?;
            std::fs::write(&output, plaintext)?;
        }
        Commands::Sweep {
            root,
            records_subdir,
        } => {
            let config = SyncConfig::new(root).with_records_subdir(records_subdir);
            let report = SyncEngine::new(config).sweep_all();
            println!(
                "swept {} records: {} converted, {} up to date, {} failed",
                report.records,
                report.converted,
                report.up_to_date,
                report.codec_failures + report.io_failures
            );
        }
        Commands::Watch {
            root,
            records_subdir,
            debounce_ms,
        } => {
            let config = SyncConfig::new(root).with_records_subdir(records_subdir);
            let debouncer = Debouncer::new(SyncEngine::new(config))
                .with_delay(Duration::from_millis(debounce_ms));
            debouncer.start()?;
            info!("watching for save changes");
            // The worker owns all the work; this thread just stays alive.
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}
