// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Task runners
//!
//! This module provides the runner trait, the registry that maps runner type
//! names to constructors, and the built-in runners (noop, shell).

mod noop;
mod shell;

pub use noop::NoopRunner;
pub use shell::ShellRunner;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::consumable::Consumables;
use crate::errors::{PipewrightError, PipewrightResult};

/// Trait for task runners
#[async_trait]
pub trait Runner: Send + Sync {
    /// Execute the task
    ///
    /// # Arguments
    /// * `inputs` - Resolved input consumables keyed by task-local parameter name
    ///
    /// Returns the produced consumables keyed by output name. Keys should
    /// cover the task's declared outputs.
    async fn execute(&self, inputs: &Consumables) -> anyhow::Result<Consumables>;
}

/// Everything a runner factory gets to know about its task
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Name of the task the runner is bound to
    pub task_name: String,

    /// Outputs the task promises to produce
    pub declared_outputs: Vec<String>,

    /// Runner-specific parameters from the definition
    pub params: serde_yaml::Mapping,
}

impl RunnerConfig {
    /// Look up a string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Constructor for a runner instance
pub type RunnerFactory =
    Arc<dyn Fn(&RunnerConfig) -> anyhow::Result<Box<dyn Runner>> + Send + Sync>;

/// Registry of runner types
///
/// Registration goes through `&self`, so a registry shared behind an `Arc`
/// still accepts runners registered after pipelines were assembled.
#[derive(Default)]
pub struct RunnerRegistry {
    factories: RwLock<HashMap<String, RunnerFactory>>,
}

impl RunnerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in runners
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        registry.register("noop", |config| Ok(Box::new(NoopRunner::new(config))));
        registry.register("shell", |config| {
            ShellRunner::from_config(config).map(|r| Box::new(r) as Box<dyn Runner>)
        });

        registry
    }

    /// Register (or replace) a runner type
    pub fn register<F>(&self, type_key: &str, factory: F)
    where
        F: Fn(&RunnerConfig) -> anyhow::Result<Box<dyn Runner>> + Send + Sync + 'static,
    {
        let replaced = self
            .factories
            .write()
            .insert(type_key.to_string(), Arc::new(factory))
            .is_some();

        if replaced {
            tracing::debug!(runner = type_key, "replaced runner registration");
        }
    }

    /// Whether a runner type is registered
    pub fn contains(&self, type_key: &str) -> bool {
        self.factories.read().contains_key(type_key)
    }

    /// Registered runner types, sorted
    pub fn runner_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Instantiate a runner for a task
    pub fn create(&self, type_key: &str, config: &RunnerConfig) -> PipewrightResult<Box<dyn Runner>> {
        // Clone the factory out so the lock is not held while it runs.
        let factory = self.factories.read().get(type_key).cloned();

        let Some(factory) = factory else {
            return Err(PipewrightError::unknown_runner(
                type_key,
                &config.task_name,
                &self.runner_types(),
            ));
        };

        factory(config).map_err(|e| PipewrightError::InvalidTaskDefinition {
            task: config.task_name.clone(),
            reason: format!("runner '{}' rejected its configuration: {}", type_key, e),
        })
    }
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("runner_types", &self.runner_types())
            .finish()
    }
}
