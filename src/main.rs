//! Tabular AutoML - Main Entry Point
//!
//! Trains, compares and serves regression models from the command line.

use clap::Parser;
use tabular_automl::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabular_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, target, features, test_size, artifact, config } => {
            cmd_train(&data, &target, &features, test_size, artifact.as_deref(), config.as_deref())?;
        }
        Commands::Predict { artifact, values } => {
            cmd_predict(&artifact, &values)?;
        }
        Commands::Info { data, config } => {
            cmd_info(&data, config.as_deref())?;
        }
    }

    Ok(())
}
