// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline validation
//!
//! Checks a pipeline before execution. Resolution failures become errors;
//! suspicious but runnable wiring becomes warnings.

use std::collections::HashSet;

use crate::errors::PipewrightError;
use crate::pipeline::{Pipeline, Producer, TaskGraph};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.tasks().is_empty() {
            result.add_error("Pipeline has no tasks defined");
        }

        // Runner types are only looked up at run time, so missing ones are warnings here
        for task in pipeline.tasks() {
            if !pipeline.registry().contains(task.runner_type()) {
                result.add_warning(&format!(
                    "Task '{}': runner '{}' is not registered",
                    task.name(),
                    task.runner_type()
                ));
            }
        }

        let dag = match TaskGraph::build(pipeline) {
            Ok(dag) => dag,
            Err(PipewrightError::CyclicDependency { cycle, .. }) => {
                result.add_error(&format!("Cyclic dependency: {}", cycle.join(" → ")));
                return result;
            }
            Err(e) => {
                result.add_error(&e.to_string());
                return result;
            }
        };

        Self::check_expected_outputs(pipeline, &dag, &mut result);
        Self::check_unused(pipeline, &mut result);

        result
    }

    /// Expected outputs nobody declares can only fail at the end of a run
    fn check_expected_outputs(pipeline: &Pipeline, dag: &TaskGraph, result: &mut ValidationResult) {
        for expected in pipeline.expected_outputs() {
            if dag.producer_of(expected).is_none() {
                result.add_error(&format!(
                    "Pipeline output '{}' is not produced by any task or input",
                    expected
                ));
            }
        }
    }

    fn check_unused(pipeline: &Pipeline, result: &mut ValidationResult) {
        let consumed: HashSet<&str> = pipeline
            .tasks()
            .iter()
            .flat_map(|t| t.input_refs().iter().map(|(_, r)| r.as_str()))
            .chain(pipeline.expected_outputs().iter().map(String::as_str))
            .collect();

        for input in pipeline.external_inputs() {
            if !consumed.contains(input.name()) {
                result.add_warning(&format!(
                    "Pipeline input '{}' is never consumed",
                    input.name()
                ));
            }
        }

        for task in pipeline.tasks() {
            for full_name in task.output_full_names() {
                if !consumed.contains(full_name.as_str()) {
                    result.add_warning(&format!(
                        "Task '{}': output '{}' is neither consumed nor a pipeline output",
                        task.name(),
                        full_name
                    ));
                }
            }
        }
    }

    /// Pipeline outputs that come straight from an external input
    pub fn passthrough_outputs(pipeline: &Pipeline, dag: &TaskGraph) -> Vec<String> {
        pipeline
            .expected_outputs()
            .iter()
            .filter(|name| dag.producer_of(name) == Some(&Producer::External))
            .cloned()
            .collect()
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
