// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipewright.

pub mod graph;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::consumable::Content;
use crate::errors::{PipewrightError, RecoverySuggestion};
use crate::pipeline::{load_definition, AssembleOptions, Assembler, Pipeline};
use crate::runners::RunnerRegistry;

/// Declarative task pipelines
///
/// Resolve, check and run pipelines of named tasks.
#[derive(Parser, Debug)]
#[clap(
    name = "pipewright",
    version,
    about = "Resolve and run declarative task pipelines",
    long_about = None,
    after_help = "Examples:\n\
        pipewright validate pipeline.yaml            Check a pipeline definition\n\
        pipewright run pipeline.yaml -i raw=x        Run with input 'raw'\n\
        pipewright graph pipeline.yaml -f mermaid    Show the task graph\n\n\
        See 'pipewright <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Accept the legacy layout where mappings are written as lists of single-key mappings
    #[clap(long, global = true)]
    pub flatten_lists: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(default_value = "pipeline.yaml")]
        pipeline: PathBuf,

        /// Pipeline input value as NAME=VALUE (repeatable)
        #[clap(short, long = "input", value_name = "NAME=VALUE", value_parser = parse_key_val)]
        inputs: Vec<(String, String)>,

        /// Maximum number of tasks running at once
        #[clap(short, long, default_value = "1", env = "PIPEWRIGHT_JOBS")]
        jobs: usize,

        /// Dry run (resolve and show the plan without running tasks)
        #[clap(long)]
        dry_run: bool,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = "pipeline.yaml")]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = "pipeline.yaml")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
}

/// Output format for the run command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Parse a `NAME=VALUE` pair
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;

    if name.is_empty() {
        return Err(format!("missing input name in '{}'", s));
    }

    Ok((name.to_string(), value.to_string()))
}

/// Load and assemble a pipeline file with the built-in runners
pub(crate) fn load_pipeline(
    pipeline_path: &Path,
    values: HashMap<String, Content>,
    options: AssembleOptions,
) -> miette::Result<Pipeline> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let definition = load_definition(pipeline_path)?;
    let registry = Arc::new(RunnerRegistry::with_builtins());

    Assembler::new(registry)
        .with_options(options)
        .assemble(&definition, values)
        .map_err(|e| report_with_hint(e, pipeline_path))
}

/// Print a recovery hint, if there is one, and turn the error into a report
pub(crate) fn report_with_hint(error: PipewrightError, pipeline_path: &Path) -> miette::Report {
    if let Some(suggestion) =
        RecoverySuggestion::for_error(&error, &pipeline_path.display().to_string())
    {
        eprintln!("{}", suggestion.to_string().dimmed());
    }
    miette::Report::new(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("raw=a=b").unwrap(),
            ("raw".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_val("raw=").unwrap().1, "");
        assert!(parse_key_val("raw").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "pipewright", "run", "ml.yaml", "-i", "raw=x", "--input", "seed=1", "-j", "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { pipeline, inputs, jobs, .. } => {
                assert_eq!(pipeline, PathBuf::from("ml.yaml"));
                assert_eq!(inputs.len(), 2);
                assert_eq!(jobs, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_formats() {
        let cli = Cli::try_parse_from(["pipewright", "graph", "p.yaml", "--format", "mermaid"]).unwrap();
        assert!(matches!(cli.command, Commands::Graph { format: GraphFormat::Mermaid, .. }));

        let cli = Cli::try_parse_from(["pipewright", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { format: OutputFormat::Text, jobs: 1, .. }));

        assert!(Cli::try_parse_from(["pipewright", "graph", "--format", "png"]).is_err());
    }
}
