// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Error types
//!
//! Structural errors (definition, duplicate outputs, unresolved references,
//! cycles, unknown runners) are raised before any task executes. Runner
//! failures and missing expected outputs are raised while running.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use thiserror::Error;

/// Result type for pipewright operations
pub type PipewrightResult<T> = Result<T, PipewrightError>;

/// Main error type for pipewright
#[derive(Error, Debug, Diagnostic)]
pub enum PipewrightError {
    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(pipewright::invalid_definition))]
    InvalidDefinition {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Task '{task}' is invalid: {reason}")]
    #[diagnostic(code(pipewright::invalid_task_definition))]
    InvalidTaskDefinition { task: String, reason: String },

    #[error("Invalid consumable: {reason}")]
    #[diagnostic(code(pipewright::invalid_consumable))]
    InvalidConsumable { reason: String },

    #[error("Pipeline input '{name}' was declared but no value was supplied")]
    #[diagnostic(
        code(pipewright::missing_pipeline_input),
        help("Pass it on the command line with '--input {name}=<value>'")
    )]
    MissingPipelineInput { name: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("'{full_name}' is produced by both '{first}' and '{second}'")]
    #[diagnostic(
        code(pipewright::duplicate_output_definition),
        help("Every consumable full name must have exactly one producer")
    )]
    DuplicateOutputDefinition {
        full_name: String,
        first: String,
        second: String,
    },

    #[error("Task '{task}' references '{reference}', which nothing produces")]
    #[diagnostic(
        code(pipewright::unresolved_reference),
        help("Reference a pipeline input by name or a task output as 'task.output'")
    )]
    UnresolvedReference { task: String, reference: String },

    #[error("Cyclic dependency detected at task '{task}' (cycle: {})", .cycle.join(" → "))]
    #[diagnostic(
        code(pipewright::cyclic_dependency),
        help("Review the input references of the tasks on the cycle")
    )]
    CyclicDependency { task: String, cycle: Vec<String> },

    #[error("Unknown runner type '{runner}' for task '{task}'")]
    #[diagnostic(code(pipewright::unknown_runner_type))]
    UnknownRunnerType {
        runner: String,
        task: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task '{task}' failed: {source}")]
    #[diagnostic(code(pipewright::runner_execution_error))]
    RunnerExecutionError {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Expected output '{name}' was not produced")]
    #[diagnostic(
        code(pipewright::missing_expected_output),
        help("Declare '{name}' as an output of a task, or remove it from the pipeline outputs")
    )]
    MissingExpectedOutput { name: String },

    #[error("Execution failed: {message}")]
    #[diagnostic(code(pipewright::execution_failed))]
    ExecutionFailed { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipewright::file_read_error))]
    FileReadError {
        path: std::path::PathBuf,
        error: String,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(pipewright::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipewright::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(pipewright::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for PipewrightError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipewrightError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipewrightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl PipewrightError {
    /// Shorthand for a definition error without help text
    pub fn invalid_definition(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            reason: reason.into(),
            help: None,
        }
    }

    /// Shorthand for a task definition error
    pub fn invalid_task(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTaskDefinition {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown runner error listing what is registered
    pub fn unknown_runner(runner: &str, task: &str, available: &[String]) -> Self {
        let help = if available.is_empty() {
            Some("No runners are registered".to_string())
        } else {
            Some(format!("Registered runners: {}", available.join(", ")))
        };

        Self::UnknownRunnerType {
            runner: runner.to_string(),
            task: task.to_string(),
            help,
        }
    }

    /// Whether this error was raised before any task started
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidDefinition { .. }
                | Self::InvalidTaskDefinition { .. }
                | Self::InvalidConsumable { .. }
                | Self::MissingPipelineInput { .. }
                | Self::DuplicateOutputDefinition { .. }
                | Self::UnresolvedReference { .. }
                | Self::CyclicDependency { .. }
                | Self::UnknownRunnerType { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_runner_lists_available() {
        let err = PipewrightError::unknown_runner(
            "torch",
            "train",
            &["noop".to_string(), "shell".to_string()],
        );

        match err {
            PipewrightError::UnknownRunnerType { help, .. } => {
                assert_eq!(help.as_deref(), Some("Registered runners: noop, shell"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_runner_error_keeps_source() {
        use std::error::Error as _;

        let err = PipewrightError::RunnerExecutionError {
            task: "clean".into(),
            source: anyhow::anyhow!("disk full"),
        };

        assert!(err.to_string().contains("disk full"));
        assert!(err.source().is_some());
        assert!(!err.is_structural());
    }
}
