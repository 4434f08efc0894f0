// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Shell runner
//!
//! Runs a shell command for a task. String inputs are exposed as
//! `PIPEWRIGHT_INPUT_<PARAM>` environment variables and the trimmed stdout
//! is published under every declared output.

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tokio::process::Command;

use super::{Runner, RunnerConfig};
use crate::consumable::{Consumable, Consumables};

/// Prefix of the environment variables carrying inputs
pub const INPUT_ENV_PREFIX: &str = "PIPEWRIGHT_INPUT_";

/// Shell runner
#[derive(Debug, Clone)]
pub struct ShellRunner {
    task_name: String,
    command: String,
    shell: String,
    outputs: Vec<String>,
}

impl ShellRunner {
    /// Build from a task's runner configuration
    ///
    /// Requires a non-empty `command` parameter; `shell` defaults to bash.
    pub fn from_config(config: &RunnerConfig) -> anyhow::Result<Self> {
        let command = config
            .param_str("command")
            .context("missing string parameter 'command'")?;

        if command.trim().is_empty() {
            bail!("shell command is empty");
        }

        Ok(Self {
            task_name: config.task_name.clone(),
            command: command.to_string(),
            shell: config.param_str("shell").unwrap_or("bash").to_string(),
            outputs: config.declared_outputs.clone(),
        })
    }

    fn env_var_name(param: &str) -> String {
        let suffix: String = param
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", INPUT_ENV_PREFIX, suffix)
    }
}

#[async_trait]
impl Runner for ShellRunner {
    async fn execute(&self, inputs: &Consumables) -> anyhow::Result<Consumables> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&self.command);
        cmd.kill_on_drop(true);

        let mut exported: HashMap<String, &str> = HashMap::new();
        for (param, consumable) in inputs {
            match consumable.content().as_str() {
                Some(value) => {
                    let var = Self::env_var_name(param);
                    if let Some(other) = exported.insert(var.clone(), param.as_str()) {
                        bail!(
                            "inputs '{}' and '{}' both map to environment variable {}",
                            other,
                            param,
                            var
                        );
                    }
                    cmd.env(var, value);
                }
                None => tracing::debug!(
                    task = %self.task_name,
                    param = %param,
                    "skipping non-string input for shell runner"
                ),
            }
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("shell '{}' could not be started", self.shell))?;

        tracing::debug!(
            task = %self.task_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "shell command finished"
        );

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("command exited with code {}: {}", exit_code, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

        self.outputs
            .iter()
            .map(|name| -> anyhow::Result<(String, Consumable)> {
                Ok((name.clone(), Consumable::new(name.as_str(), stdout.clone())?))
            })
            .collect()
    }
}
