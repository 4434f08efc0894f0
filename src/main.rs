// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! pipewright - Declarative Task Pipelines
//!
//! Resolve, check and run pipelines of named tasks.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipewright::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let default_filter = if cli.verbose {
        "pipewright=debug"
    } else {
        "pipewright=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            pipeline,
            inputs,
            jobs,
            dry_run,
            format,
        } => {
            pipewright::cli::run::run(
                pipeline,
                inputs,
                jobs,
                dry_run,
                format,
                cli.flatten_lists,
                cli.verbose,
            )
            .await
        }
        Commands::Validate { pipeline } => {
            pipewright::cli::validate::run(pipeline, cli.flatten_lists, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            pipewright::cli::graph::run(pipeline, format, cli.flatten_lists, cli.verbose).await
        }
    }
}
