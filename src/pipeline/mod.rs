// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipelines
//!
//! Tasks, the pipeline that owns them, dependency resolution, execution,
//! validation and assembly from definition trees.

mod assembler;
mod dag;
mod definition;
mod executor;
mod task;
mod validation;

pub use assembler::{assemble, load_definition, parse_definition, AssembleOptions, Assembler};
pub use dag::{Producer, TaskGraph};
pub use definition::Pipeline;
pub use executor::{ExecutionOptions, PipelineExecutor, RunOutcome};
pub use task::{Task, TaskFactory};
pub use validation::{PipelineValidator, ValidationResult};
