// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline model
//!
//! Holds the tasks in declaration order, the externally supplied inputs and
//! the outputs the pipeline promises. Resolution and execution live in
//! [`TaskGraph`](super::TaskGraph) and [`PipelineExecutor`](super::PipelineExecutor).

use std::sync::Arc;

use crate::consumable::Consumable;
use crate::errors::{PipewrightError, PipewrightResult};
use crate::pipeline::{ExecutionOptions, PipelineExecutor, RunOutcome, Task, TaskGraph};
use crate::runners::RunnerRegistry;

/// A named set of tasks wired together by consumable full names
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    tasks: Vec<Task>,
    external_inputs: Vec<Consumable>,
    expected_outputs: Vec<String>,
    registry: Arc<RunnerRegistry>,
}

impl Pipeline {
    /// Create an empty pipeline bound to a runner registry
    pub fn new(name: impl Into<String>, registry: Arc<RunnerRegistry>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            external_inputs: Vec::new(),
            expected_outputs: Vec::new(),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks in declaration order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn external_inputs(&self) -> &[Consumable] {
        &self.external_inputs
    }

    pub fn expected_outputs(&self) -> &[String] {
        &self.expected_outputs
    }

    pub fn registry(&self) -> &Arc<RunnerRegistry> {
        &self.registry
    }

    /// Get a task by name
    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    /// Get all task names
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Get an external input by name
    pub fn external_input(&self, name: &str) -> Option<&Consumable> {
        self.external_inputs.iter().find(|c| c.name() == name)
    }

    /// Append a task; names must be unique
    pub fn add_task(&mut self, task: Task) -> PipewrightResult<()> {
        if self.get_task(task.name()).is_some() {
            return Err(PipewrightError::invalid_task(
                task.name(),
                "a task with this name is already defined",
            ));
        }

        self.tasks.push(task);
        Ok(())
    }

    /// Add an externally supplied input
    pub fn add_input(&mut self, input: Consumable) -> PipewrightResult<()> {
        if !input.is_external() {
            return Err(PipewrightError::InvalidConsumable {
                reason: format!(
                    "'{}' is produced by a task and cannot be a pipeline input",
                    input.full_name()
                ),
            });
        }

        if self.external_input(input.name()).is_some() {
            return Err(PipewrightError::DuplicateOutputDefinition {
                full_name: input.full_name(),
                first: "pipeline input".into(),
                second: "pipeline input".into(),
            });
        }

        self.external_inputs.push(input);
        Ok(())
    }

    /// Declare an output the run must produce; repeats are ignored
    pub fn add_output(&mut self, full_name: impl Into<String>) {
        let full_name = full_name.into();
        if !self.expected_outputs.contains(&full_name) {
            self.expected_outputs.push(full_name);
        }
    }

    /// Resolve the dependency graph without running anything
    pub fn resolve(&self) -> PipewrightResult<TaskGraph> {
        TaskGraph::build(self)
    }

    /// Run with default options (sequential)
    pub async fn run(&self) -> PipewrightResult<RunOutcome> {
        self.run_with(&ExecutionOptions::default()).await
    }

    /// Run with explicit options
    pub async fn run_with(&self, options: &ExecutionOptions) -> PipewrightResult<RunOutcome> {
        PipelineExecutor::new(options.clone()).execute(self).await
    }
}
