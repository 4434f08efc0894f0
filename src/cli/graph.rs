// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::collections::HashMap;
use std::path::PathBuf;

use super::{load_pipeline, report_with_hint, GraphFormat};
use crate::pipeline::AssembleOptions;

/// Run the graph command
pub async fn run(
    pipeline_path: PathBuf,
    format: GraphFormat,
    flatten_lists: bool,
    _verbose: bool,
) -> Result<()> {
    let options = AssembleOptions {
        flatten_lists,
        allow_missing_inputs: true,
    };
    let pipeline = load_pipeline(&pipeline_path, HashMap::new(), options)?;

    let dag = pipeline
        .resolve()
        .map_err(|e| report_with_hint(e, &pipeline_path))?;

    // Output in requested format
    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline),
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    };

    print!("{}", output);

    Ok(())
}
