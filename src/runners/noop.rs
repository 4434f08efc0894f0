// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! No-op runner
//!
//! Passes data through untouched: every declared output carries the content
//! of the first input (by parameter name), or an empty string when the task
//! has no inputs.

use async_trait::async_trait;

use super::{Runner, RunnerConfig};
use crate::consumable::{Consumable, Consumables, Content};

/// Pass-through runner
#[derive(Debug, Clone)]
pub struct NoopRunner {
    outputs: Vec<String>,
}

impl NoopRunner {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            outputs: config.declared_outputs.clone(),
        }
    }
}

#[async_trait]
impl Runner for NoopRunner {
    async fn execute(&self, inputs: &Consumables) -> anyhow::Result<Consumables> {
        let content = inputs
            .iter()
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, c)| c.content().clone())
            .unwrap_or_else(|| Content::from(""));

        self.outputs
            .iter()
            .map(|name| -> anyhow::Result<(String, Consumable)> {
                Ok((name.clone(), Consumable::new(name.as_str(), content.clone())?))
            })
            .collect()
    }
}
