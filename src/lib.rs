// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! # pipewright - Declarative Task Pipelines
//!
//! `pipewright` runs pipelines declared as a flat list of named tasks. Each
//! task reads named consumables (pipeline inputs or other tasks' outputs,
//! addressed as `input` or `task.output`) and produces its own outputs.
//!
//! ## Features
//!
//! - **Graph resolution** - References, duplicates and cycles are checked before anything runs
//! - **Stable ordering** - Independent tasks keep their declaration order
//! - **Pluggable runners** - Register runner types by name on a shared registry
//! - **Bounded parallelism** - Independent branches may run concurrently
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline definition
//! pipewright validate pipeline.yaml
//!
//! # Run it, supplying its inputs
//! pipewright run pipeline.yaml --input raw=data.csv
//!
//! # Show the task graph
//! pipewright graph pipeline.yaml --format mermaid
//! ```

pub mod cli;
pub mod consumable;
pub mod errors;
pub mod pipeline;
pub mod runners;

// Re-export commonly used types
pub use consumable::{Consumable, Consumables, Content};
pub use errors::{PipewrightError, PipewrightResult};
pub use pipeline::{assemble, ExecutionOptions, Pipeline, RunOutcome, Task, TaskFactory, TaskGraph};
pub use runners::{Runner, RunnerConfig, RunnerRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
