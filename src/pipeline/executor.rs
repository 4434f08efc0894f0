// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline executor
//!
//! Runs tasks in dependency order, routing consumables between them.
//!
//! The scheduler loop is the only writer of the availability registry. A task
//! is spawned once every producer it reads from has completed, and ready
//! tasks are always released lowest declaration index first, so with
//! `max_parallel == 1` the run follows [`TaskGraph::execution_order`] exactly.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::consumable::{Consumable, Consumables};
use crate::errors::{PipewrightError, PipewrightResult};
use crate::pipeline::{Pipeline, Task, TaskGraph};
use crate::runners::Runner;

/// Pipeline execution options
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Upper bound on tasks running at once; 1 runs strictly sequentially
    pub max_parallel: usize,
    /// Resolve and instantiate runners, but run nothing
    pub dry_run: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            dry_run: false,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Every available consumable at the end of the run, keyed by full name
    pub outputs: HashMap<String, Consumable>,
    /// Task names in the order they were started
    pub execution_order: Vec<String>,
    /// Wall time per task
    pub task_durations: HashMap<String, Duration>,
    /// Total execution time
    pub duration: Duration,
}

impl RunOutcome {
    /// Look up a consumable by full name
    pub fn get(&self, full_name: &str) -> Option<&Consumable> {
        self.outputs.get(full_name)
    }
}

type TaskCompletion = (usize, Duration, anyhow::Result<Consumables>);

/// Pipeline executor
#[derive(Debug, Clone, Default)]
pub struct PipelineExecutor {
    options: ExecutionOptions,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(options: ExecutionOptions) -> Self {
        Self { options }
    }

    /// Execute a pipeline
    #[instrument(name = "pipeline", skip_all, fields(pipeline = %pipeline.name()))]
    pub async fn execute(&self, pipeline: &Pipeline) -> PipewrightResult<RunOutcome> {
        let start = Instant::now();

        // Everything structural fails here, before any task runs
        let dag = pipeline.resolve()?;
        let runners = Self::instantiate_runners(pipeline, &dag)?;

        info!(
            tasks = pipeline.tasks().len(),
            order = %dag.execution_order_names().join(" → "),
            "execution plan"
        );

        let mut available: HashMap<String, Consumable> = pipeline
            .external_inputs()
            .iter()
            .map(|input| (input.full_name(), input.clone()))
            .collect();

        if self.options.dry_run {
            return Ok(RunOutcome {
                outputs: available,
                execution_order: dag
                    .execution_order_names()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                task_durations: HashMap::new(),
                duration: start.elapsed(),
            });
        }

        let mut task_durations = HashMap::new();
        let execution_order = self
            .schedule(pipeline, &dag, &runners, &mut available, &mut task_durations)
            .await?;

        for expected in pipeline.expected_outputs() {
            if !available.contains_key(expected) {
                return Err(PipewrightError::MissingExpectedOutput {
                    name: expected.clone(),
                });
            }
        }

        let duration = start.elapsed();
        info!(elapsed_ms = duration.as_millis() as u64, "pipeline completed");

        Ok(RunOutcome {
            outputs: available,
            execution_order,
            task_durations,
            duration,
        })
    }

    /// Create one runner per task, indexed by declaration order
    fn instantiate_runners(
        pipeline: &Pipeline,
        dag: &TaskGraph,
    ) -> PipewrightResult<Vec<Arc<dyn Runner>>> {
        let registry = pipeline.registry();
        let mut runners: Vec<Option<Arc<dyn Runner>>> = vec![None; pipeline.tasks().len()];

        for &idx in dag.execution_order() {
            let task = &pipeline.tasks()[idx];
            let runner = registry.create(task.runner_type(), &task.runner_config())?;
            runners[idx] = Some(Arc::from(runner));
        }

        Ok(runners.into_iter().flatten().collect())
    }

    /// Drive tasks to completion; returns task names in start order
    async fn schedule(
        &self,
        pipeline: &Pipeline,
        dag: &TaskGraph,
        runners: &[Arc<dyn Runner>],
        available: &mut HashMap<String, Consumable>,
        task_durations: &mut HashMap<String, Duration>,
    ) -> PipewrightResult<Vec<String>> {
        let tasks = pipeline.tasks();
        let limit = self.options.max_parallel.max(1);

        let mut waiting_on: Vec<usize> = (0..tasks.len())
            .map(|idx| dag.dependency_indices(idx).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = waiting_on
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut running: JoinSet<TaskCompletion> = JoinSet::new();
        let mut started = Vec::with_capacity(tasks.len());
        let mut failure: Option<PipewrightError> = None;

        loop {
            while failure.is_none() && running.len() < limit {
                let Some(Reverse(idx)) = ready.pop() else {
                    break;
                };
                let task = &tasks[idx];

                let inputs = Self::gather_inputs(task, available);

                debug!(task = %task.name(), inputs = inputs.len(), "starting task");
                started.push(task.name().to_string());

                let runner = Arc::clone(&runners[idx]);
                let span = info_span!("task", task = %task.name(), runner = %task.runner_type());
                running.spawn(
                    async move {
                        let task_start = Instant::now();
                        let result = runner.execute(&inputs).await;
                        (idx, task_start.elapsed(), result)
                    }
                    .instrument(span),
                );
            }

            // Nothing running and nothing startable: done, or stopped by a failure
            let Some(joined) = running.join_next().await else {
                break;
            };

            let (idx, elapsed, result) = match joined {
                Ok(completion) => completion,
                Err(join_error) => {
                    Self::record_failure(
                        &mut failure,
                        PipewrightError::ExecutionFailed {
                            message: format!("task did not complete: {}", join_error),
                        },
                    );
                    continue;
                }
            };

            let task = &tasks[idx];
            let published = result
                .map_err(|source| PipewrightError::RunnerExecutionError {
                    task: task.name().to_string(),
                    source,
                })
                .and_then(|produced| Self::publish(task, produced, available));

            match published {
                Ok(()) => {
                    info!(
                        task = %task.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "task completed"
                    );
                    task_durations.insert(task.name().to_string(), elapsed);

                    for next in dag.dependent_indices(idx) {
                        waiting_on[next] -= 1;
                        if waiting_on[next] == 0 {
                            ready.push(Reverse(next));
                        }
                    }
                }
                Err(e) => Self::record_failure(&mut failure, e),
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        // The graph is acyclic, so every task becomes ready eventually
        debug_assert_eq!(started.len(), tasks.len());

        Ok(started)
    }

    /// Keep the first failure; later ones are only logged
    fn record_failure(failure: &mut Option<PipewrightError>, error: PipewrightError) {
        if failure.is_none() {
            error!(error = %error, "task failed, no further tasks will start");
            *failure = Some(error);
        } else {
            warn!(error = %error, "additional failure while draining running tasks");
        }
    }

    /// Collect a task's inputs keyed by its parameter names
    ///
    /// Only called once every producer the task reads from has published.
    fn gather_inputs(task: &Task, available: &HashMap<String, Consumable>) -> Consumables {
        task.input_refs()
            .iter()
            .filter_map(|(param, reference)| {
                let consumable = available.get(reference);
                debug_assert!(
                    consumable.is_some(),
                    "task '{}' scheduled before '{}' was published",
                    task.name(),
                    reference
                );
                consumable.map(|c| (param.clone(), c.clone()))
            })
            .collect()
    }

    /// Check a runner's outputs against the declaration and register them
    fn publish(
        task: &Task,
        mut produced: Consumables,
        available: &mut HashMap<String, Consumable>,
    ) -> PipewrightResult<()> {
        let missing: Vec<&str> = task
            .declared_outputs()
            .iter()
            .filter(|output| !produced.contains_key(output.as_str()))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(PipewrightError::RunnerExecutionError {
                task: task.name().to_string(),
                source: anyhow::anyhow!(
                    "declared output(s) not produced: {}",
                    missing.join(", ")
                ),
            });
        }

        for output in task.declared_outputs() {
            let Some(consumable) = produced.remove(output) else {
                continue;
            };
            let scoped = Consumable::new(output.as_str(), consumable.content().clone())?
                .produced_by(task.name());

            match available.entry(scoped.full_name()) {
                Entry::Vacant(slot) => {
                    slot.insert(scoped);
                }
                Entry::Occupied(slot) => {
                    return Err(PipewrightError::ExecutionFailed {
                        message: format!("'{}' was already published", slot.key()),
                    });
                }
            }
        }

        if !produced.is_empty() {
            let mut surplus: Vec<&String> = produced.keys().collect();
            surplus.sort();
            warn!(task = %task.name(), surplus = ?surplus, "ignoring undeclared outputs");
        }

        Ok(())
    }
}
