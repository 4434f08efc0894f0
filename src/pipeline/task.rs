// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Tasks and the task factory
//!
//! A task binds a runner type to the consumables it reads and the outputs it
//! promises. The factory validates the declared shape only; runner lookup
//! happens when the pipeline runs.

use std::collections::HashSet;

use crate::consumable::full_name;
use crate::errors::{PipewrightError, PipewrightResult};
use crate::runners::RunnerConfig;

/// A single pipeline step
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    runner_type: String,
    input_refs: Vec<(String, String)>,
    declared_outputs: Vec<String>,
    params: serde_yaml::Mapping,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runner_type(&self) -> &str {
        &self.runner_type
    }

    /// Parameter name → full name of the consumable it reads, in declaration order
    pub fn input_refs(&self) -> &[(String, String)] {
        &self.input_refs
    }

    pub fn declared_outputs(&self) -> &[String] {
        &self.declared_outputs
    }

    pub fn params(&self) -> &serde_yaml::Mapping {
        &self.params
    }

    /// Full names of the outputs, e.g. `train.model`
    pub fn output_full_names(&self) -> impl Iterator<Item = String> + '_ {
        self.declared_outputs
            .iter()
            .map(|output| full_name(Some(&self.name), output))
    }

    /// Configuration handed to the runner factory
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            task_name: self.name.clone(),
            declared_outputs: self.declared_outputs.clone(),
            params: self.params.clone(),
        }
    }
}

/// Validates task declarations and builds [`Task`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskFactory;

impl TaskFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build a task from its declared shape
    pub fn spawn<I, O>(
        &self,
        task_name: &str,
        runner_type: &str,
        inputs: I,
        outputs: O,
    ) -> PipewrightResult<Task>
    where
        I: IntoIterator<Item = (String, String)>,
        O: IntoIterator<Item = String>,
    {
        self.spawn_with_params(task_name, runner_type, inputs, outputs, serde_yaml::Mapping::new())
    }

    /// Build a task carrying runner parameters
    pub fn spawn_with_params<I, O>(
        &self,
        task_name: &str,
        runner_type: &str,
        inputs: I,
        outputs: O,
        params: serde_yaml::Mapping,
    ) -> PipewrightResult<Task>
    where
        I: IntoIterator<Item = (String, String)>,
        O: IntoIterator<Item = String>,
    {
        let invalid = |reason: String| PipewrightError::invalid_task(task_name, reason);

        if task_name.is_empty() {
            return Err(invalid("task name is empty".into()));
        }
        if task_name.contains('.') {
            return Err(invalid("task name must not contain '.'".into()));
        }
        if runner_type.trim().is_empty() {
            return Err(invalid("missing field 'runner'".into()));
        }

        let mut seen_params = HashSet::new();
        let mut input_refs = Vec::new();
        for (param, reference) in inputs {
            if param.is_empty() {
                return Err(invalid("input parameter name is empty".into()));
            }
            if reference.trim().is_empty() {
                return Err(invalid(format!("input '{}' has an empty reference", param)));
            }
            if !seen_params.insert(param.clone()) {
                return Err(invalid(format!("input '{}' is declared twice", param)));
            }
            input_refs.push((param, reference));
        }

        let mut seen_outputs = HashSet::new();
        let mut declared_outputs = Vec::new();
        for output in outputs {
            if output.is_empty() {
                return Err(invalid("output name is empty".into()));
            }
            if output.contains('.') {
                return Err(invalid(format!("output '{}' must not contain '.'", output)));
            }
            if !seen_outputs.insert(output.clone()) {
                return Err(invalid(format!("output '{}' is declared twice", output)));
            }
            declared_outputs.push(output);
        }

        if declared_outputs.is_empty() {
            return Err(invalid("field 'outputs' must list at least one output".into()));
        }

        Ok(Task {
            name: task_name.to_string(),
            runner_type: runner_type.to_string(),
            input_refs,
            declared_outputs,
            params,
        })
    }
}
