// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::{load_pipeline, report_with_hint, OutputFormat};
use crate::consumable::{Consumable, Content};
use crate::pipeline::{AssembleOptions, ExecutionOptions, Pipeline, PipelineValidator, RunOutcome};

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    inputs: Vec<(String, String)>,
    jobs: usize,
    dry_run: bool,
    format: OutputFormat,
    flatten_lists: bool,
    verbose: bool,
) -> Result<()> {
    let values: HashMap<String, Content> = inputs
        .into_iter()
        .map(|(name, value)| (name, Content::from(value)))
        .collect();

    let options = AssembleOptions {
        flatten_lists,
        ..Default::default()
    };
    let pipeline = load_pipeline(&pipeline_path, values, options)?;

    // Validate pipeline
    let validation = PipelineValidator::validate(&pipeline);

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        if let Err(e) = pipeline.resolve() {
            return Err(report_with_hint(e, &pipeline_path));
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let options = ExecutionOptions {
        max_parallel: jobs.max(1),
        dry_run,
    };

    let outcome = pipeline
        .run_with(&options)
        .await
        .map_err(|e| report_with_hint(e, &pipeline_path))?;

    match format {
        OutputFormat::Text => print_text(&pipeline, &outcome, dry_run),
        OutputFormat::Json => print_json(&pipeline, &outcome, dry_run)?,
    }

    Ok(())
}

/// Outputs worth showing: the declared pipeline outputs, or every task output
fn shown_outputs<'a>(pipeline: &Pipeline, outcome: &'a RunOutcome) -> Vec<&'a Consumable> {
    let mut shown: Vec<&Consumable> = if pipeline.expected_outputs().is_empty() {
        outcome.outputs.values().filter(|c| !c.is_external()).collect()
    } else {
        pipeline
            .expected_outputs()
            .iter()
            .filter_map(|name| outcome.get(name))
            .collect()
    };
    shown.sort_by_key(|c| c.full_name());
    shown
}

fn display_content(content: &Content) -> String {
    content
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| "<opaque>".to_string())
}

fn print_text(pipeline: &Pipeline, outcome: &RunOutcome, dry_run: bool) {
    if dry_run {
        println!("{} (dry run):", "Execution plan".bold());
        for (i, name) in outcome.execution_order.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
        return;
    }

    println!(
        "{} Pipeline '{}' completed in {:.2?}",
        "✓".green(),
        pipeline.name(),
        outcome.duration
    );

    let outputs = shown_outputs(pipeline, outcome);
    if !outputs.is_empty() {
        println!();
        println!("{}:", "Outputs".bold());
        for output in outputs {
            println!(
                "  - {} = {}",
                output.full_name().cyan(),
                display_content(output.content())
            );
        }
    }
}

/// Machine-readable summary of a run
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    pipeline: &'a str,
    dry_run: bool,
    execution_order: &'a [String],
    duration_ms: u64,
    /// Text content by full name; opaque content is `null`
    outputs: BTreeMap<String, Option<&'a str>>,
}

fn print_json(pipeline: &Pipeline, outcome: &RunOutcome, dry_run: bool) -> Result<()> {
    let outputs = if dry_run {
        BTreeMap::new()
    } else {
        shown_outputs(pipeline, outcome)
            .into_iter()
            .map(|c| (c.full_name(), c.content().as_str()))
            .collect()
    };

    let report = RunReport {
        pipeline: pipeline.name(),
        dry_run,
        execution_order: &outcome.execution_order,
        duration_ms: outcome.duration.as_millis() as u64,
        outputs,
    };

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| miette::miette!("Failed to render JSON: {}", e))?;
    println!("{}", rendered);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{assemble, parse_definition};
    use crate::runners::RunnerRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_shown_outputs_prefers_declared_outputs() {
        let definition = parse_definition(
            r#"
name: ml
inputs: [raw]
outputs: [train.model]
components:
  - clean: {runner: noop, inputs: {raw: raw}, outputs: [clean_data]}
  - train: {runner: noop, inputs: {data: clean.clean_data}, outputs: [model]}
"#,
        )
        .unwrap();
        let values = HashMap::from([("raw".to_string(), Content::from("x"))]);
        let pipeline =
            assemble(&definition, values, Arc::new(RunnerRegistry::with_builtins())).unwrap();

        let outcome = pipeline.run().await.unwrap();
        let shown: Vec<String> = shown_outputs(&pipeline, &outcome)
            .iter()
            .map(|c| c.full_name())
            .collect();
        assert_eq!(shown, vec!["train.model"]);
    }

    #[test]
    fn test_display_opaque_content() {
        assert_eq!(display_content(&Content::from("v")), "v");
        assert_eq!(display_content(&Content::new(42u32)), "<opaque>");
    }
}
