// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::PipewrightError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &PipewrightError, pipeline_file: &str) -> Option<Self> {
        match error {
            PipewrightError::CyclicDependency { cycle, .. } => {
                Some(Self::fix_cyclic_dependency(cycle, pipeline_file))
            }
            PipewrightError::UnresolvedReference { task, reference } => {
                Some(Self::fix_unresolved_reference(task, reference))
            }
            PipewrightError::MissingPipelineInput { name } => {
                Some(Self::supply_input(name, pipeline_file))
            }
            _ => None,
        }
    }

    /// Suggest breaking a dependency cycle
    pub fn fix_cyclic_dependency(tasks: &[String], pipeline_file: &str) -> Self {
        Self {
            action: "Remove cyclic dependency".into(),
            steps: vec![
                format!("Detected cycle: {}", tasks.join(" → ")),
                "A task may only consume outputs of tasks that do not depend on it".into(),
            ],
            commands: vec![
                "# Visualize your pipeline:".into(),
                format!("pipewright graph {} --format mermaid", pipeline_file),
            ],
        }
    }

    /// Suggest fixing a reference that nothing produces
    pub fn fix_unresolved_reference(task: &str, reference: &str) -> Self {
        let mut steps = vec![format!(
            "Task '{}' consumes '{}', but no pipeline input or task output has that name",
            task, reference
        )];

        match reference.split_once('.') {
            Some((producer, output)) => steps.push(format!(
                "Check that task '{}' lists '{}' under its outputs",
                producer, output
            )),
            None => steps.push(format!(
                "Add '{}' to the pipeline inputs, or qualify it as '<task>.{}'",
                reference, reference
            )),
        }

        Self {
            action: format!("Resolve reference '{}'", reference),
            steps,
            commands: vec![],
        }
    }

    /// Suggest supplying a declared pipeline input
    pub fn supply_input(name: &str, pipeline_file: &str) -> Self {
        Self {
            action: format!("Supply pipeline input '{}'", name),
            steps: vec!["Every name under the pipeline 'inputs' key needs a value".into()],
            commands: vec![format!(
                "pipewright run {} --input {}=<value>",
                pipeline_file, name
            )],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
