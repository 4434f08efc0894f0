// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::collections::HashMap;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::{AssembleOptions, PipelineValidator};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, flatten_lists: bool, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    // Input values are not needed to check the wiring
    let options = AssembleOptions {
        flatten_lists,
        allow_missing_inputs: true,
    };
    let pipeline = match load_pipeline(&pipeline_path, HashMap::new(), options) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to load pipeline", "✗".red());
            eprintln!();
            return Err(e);
        }
    };

    println!("  {} Pipeline definition is well-formed", "✓".green());

    let validation = PipelineValidator::validate(&pipeline);

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name());
        println!("  Inputs: {}", pipeline.external_inputs().len());
        println!("  Tasks: {}", pipeline.tasks().len());

        if let Ok(dag) = pipeline.resolve() {
            for line in dag.to_text(&pipeline).lines() {
                println!("  {}", line);
            }

            let passthrough = PipelineValidator::passthrough_outputs(&pipeline, &dag);
            if !passthrough.is_empty() {
                println!(
                    "  {}",
                    format!("Outputs passed straight from inputs: {}", passthrough.join(", "))
                        .dimmed()
                );
            }
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}
