//! colkms CLI
//!
//! Command-line tools for colkms key management.
//!
//! # Commands
//!
//! - `demo` - Write and read the demo order table end to end
//! - `wrap` - Generate a data key and wrap it under a master key
//! - `unwrap` - Verify a wrapped key against a master key
//! - `check-plan` - Validate a JSON plan file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// colkms envelope key management tools.
#[derive(Parser)]
#[command(name = "colkms")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plan file used by `demo` and `check-plan`
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write and read the demo order table end to end
    Demo {
        /// JSON key file (defaults to the built-in demo keys)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate a data key and print it wrapped under a master key
    Wrap {
        /// JSON key file
        #[arg(short, long)]
        key_file: PathBuf,

        /// Master key identifier
        #[arg(short, long)]
        master_key: String,

        /// Data key length in bits (128 or 256)
        #[arg(short, long, default_value = "128")]
        bits: u32,
    },

    /// Verify a base64 wrapped key and print the data key fingerprint
    Unwrap {
        /// JSON key file
        #[arg(short, long)]
        key_file: PathBuf,

        /// Master key identifier
        #[arg(short, long)]
        master_key: String,

        /// Base64 wrapped key
        #[arg(short, long)]
        wrapped: String,
    },

    /// Validate a JSON plan file and print its roles
    CheckPlan {
        /// Plan file (defaults to --config)
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Demo { key_file, format } => {
            commands::demo::run(key_file.as_deref(), cli.config.as_deref(), &format)?;
        }
        Commands::Wrap {
            key_file,
            master_key,
            bits,
        } => {
            commands::wrap::run(&key_file, &master_key, bits)?;
        }
        Commands::Unwrap {
            key_file,
            master_key,
            wrapped,
        } => {
            commands::unwrap::run(&key_file, &master_key, &wrapped)?;
        }
        Commands::CheckPlan { plan } => {
            let path = plan
                .or(cli.config)
                .ok_or("Plan file required for check-plan (--plan or --config)")?;
            commands::check_plan::run(&path)?;
        }
        Commands::Version => {
            println!("colkms CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("colkms core v{}", colkms_core::VERSION);
        }
    }

    Ok(())
}
