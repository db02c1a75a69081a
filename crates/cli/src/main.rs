//! Rhythm Deck CLI - Database migrations and deployment checks.
//!
//! # Usage
//!
//! ```bash
//! # Run profile store migrations
//! rd-cli migrate
//!
//! # Validate the server configuration without starting it
//! rd-cli check-config
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rd-cli")]
#[command(author, version, about = "Rhythm Deck CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run profile store migrations
    Migrate,
    /// Load and validate the server configuration
    CheckConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::CheckConfig => commands::check_config::run()?,
    }
    Ok(())
}
