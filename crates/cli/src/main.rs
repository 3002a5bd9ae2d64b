// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mywant` — run, validate, and inspect declarative want configurations.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mywant", version, about = "Declarative workflow engine")]
struct Cli {
    /// Directory of want type definition YAML files.
    #[arg(long, global = true)]
    types: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a want config until shutdown (or until all wants settle).
    Run {
        /// Want config file (a wants list or a recipe reference).
        config: PathBuf,
        /// Snapshot file for persistence and restart recovery.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Exit once every want is Completed or Failed.
        #[arg(long)]
        until_settled: bool,
        /// Reconciler tick period in milliseconds.
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
    },
    /// Parse and validate config, recipes, and type definitions.
    Validate {
        /// Want config file.
        config: PathBuf,
    },
    /// Print the resolved edge list for a config (resolver dry run).
    Graph {
        /// Want config file.
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config, snapshot, until_settled, tick_ms } => {
            commands::run(&config, cli.types.as_deref(), snapshot, until_settled, tick_ms).await
        }
        Command::Validate { config } => commands::validate(&config, cli.types.as_deref()),
        Command::Graph { config } => commands::graph(&config),
    }
}
