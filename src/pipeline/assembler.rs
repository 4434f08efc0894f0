// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline assembly
//!
//! Turns a definition tree plus externally supplied values into a
//! [`Pipeline`]. The tree looks like:
//!
//! ```yaml
//! pipeline:
//!   name: ml
//!   inputs: [raw]
//!   outputs: [train.model]
//!   components:
//!     - clean:
//!         runner: noop
//!         inputs: { raw: raw }
//!         outputs: [clean_data]
//!     - train:
//!         runner: noop
//!         inputs: { data: clean.clean_data }
//!         outputs: [model]
//! ```
//!
//! The `pipeline` root key is optional. Component `inputs` may also be a
//! plain list of references, in which case each reference is its own
//! parameter name.

use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::consumable::{Consumable, Content};
use crate::errors::{PipewrightError, PipewrightResult};
use crate::pipeline::{Pipeline, TaskFactory};
use crate::runners::RunnerRegistry;

const PIPELINE_KEYS: [&str; 4] = ["name", "inputs", "outputs", "components"];
const COMPONENT_KEYS: [&str; 3] = ["runner", "inputs", "outputs"];

/// Assembly options
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    /// Accept mappings written as lists of single-key mappings, at the
    /// pipeline level and inside each component
    pub flatten_lists: bool,
    /// Stand in an empty value for declared inputs with no supplied value,
    /// so a definition can be checked without running it
    pub allow_missing_inputs: bool,
}

/// Builds pipelines from definition trees
#[derive(Debug, Clone)]
pub struct Assembler {
    registry: Arc<RunnerRegistry>,
    options: AssembleOptions,
    factory: TaskFactory,
}

impl Assembler {
    pub fn new(registry: Arc<RunnerRegistry>) -> Self {
        Self {
            registry,
            options: AssembleOptions::default(),
            factory: TaskFactory::new(),
        }
    }

    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a pipeline; every declared input must have a supplied value
    pub fn assemble(
        &self,
        definition: &Value,
        external_values: HashMap<String, Content>,
    ) -> PipewrightResult<Pipeline> {
        let root = definition.get("pipeline").unwrap_or(definition);
        let content = self.normalize(root.clone());

        let Value::Mapping(content) = content else {
            return Err(PipewrightError::invalid_definition(
                "pipeline definition must be a mapping",
            ));
        };

        let missing: Vec<&str> = PIPELINE_KEYS
            .iter()
            .copied()
            .filter(|key| !content.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(PipewrightError::InvalidDefinition {
                reason: format!("pipeline is missing key(s): {}", missing.join(", ")),
                help: Some(format!("A pipeline needs all of: {}", PIPELINE_KEYS.join(", "))),
            });
        }

        let name = scalar_string(&content["name"])
            .ok_or_else(|| PipewrightError::invalid_definition("'name' must be a string"))?;

        tracing::debug!(pipeline = %name, "assembling pipeline");
        let mut pipeline = Pipeline::new(name, Arc::clone(&self.registry));

        let Value::Sequence(components) = &content["components"] else {
            return Err(PipewrightError::invalid_definition(
                "'components' must be a list",
            ));
        };
        for component in components {
            let task = self.component_to_task(component)?;
            pipeline.add_task(task)?;
        }

        let inputs = string_list(&content["inputs"])
            .map_err(|e| PipewrightError::invalid_definition(format!("'inputs' {}", e)))?;
        for input in inputs {
            // A repeated declaration must reach add_input to be reported as a duplicate
            let value = match external_values.get(&input).cloned() {
                Some(value) => value,
                None if self.options.allow_missing_inputs => {
                    tracing::debug!(input = %input, "no value supplied, using placeholder");
                    Content::from("")
                }
                None => return Err(PipewrightError::MissingPipelineInput { name: input }),
            };
            pipeline.add_input(Consumable::new(input, value)?)?;
        }

        let mut extra: Vec<&String> = external_values
            .keys()
            .filter(|name| pipeline.external_input(name).is_none())
            .collect();
        if !extra.is_empty() {
            extra.sort();
            tracing::debug!(extra = ?extra, "ignoring values for undeclared inputs");
        }

        let outputs = string_list(&content["outputs"])
            .map_err(|e| PipewrightError::invalid_definition(format!("'outputs' {}", e)))?;
        for output in outputs {
            pipeline.add_output(output);
        }

        Ok(pipeline)
    }

    fn component_to_task(&self, component: &Value) -> PipewrightResult<crate::pipeline::Task> {
        let entry = match component {
            Value::Mapping(m) if m.len() == 1 => m.iter().next(),
            _ => None,
        };
        let Some((key, body)) = entry else {
            return Err(PipewrightError::InvalidDefinition {
                reason: "each component must be a single-key mapping".into(),
                help: Some("Write components as '- <name>: { runner, inputs, outputs }'".into()),
            });
        };

        let task_name = scalar_string(key).ok_or_else(|| {
            PipewrightError::invalid_definition("component names must be strings")
        })?;
        let invalid = |reason: String| PipewrightError::invalid_task(task_name.as_str(), reason);

        let Value::Mapping(body) = self.normalize(body.clone()) else {
            return Err(invalid("component body must be a mapping".into()));
        };

        let missing: Vec<&str> = COMPONENT_KEYS
            .iter()
            .copied()
            .filter(|key| !body.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("missing field(s): {}", missing.join(", "))));
        }

        let runner = scalar_string(&body["runner"])
            .ok_or_else(|| invalid("field 'runner' must be a string".into()))?;
        let inputs = input_refs(&self.normalize(body["inputs"].clone()))
            .map_err(|e| invalid(format!("field 'inputs' {}", e)))?;
        let outputs = string_list(&body["outputs"])
            .map_err(|e| invalid(format!("field 'outputs' {}", e)))?;
        let params = match body.get("params") {
            None | Some(Value::Null) => Mapping::new(),
            Some(Value::Mapping(params)) => params.clone(),
            Some(_) => return Err(invalid("field 'params' must be a mapping".into())),
        };

        self.factory
            .spawn_with_params(&task_name, &runner, inputs, outputs, params)
    }

    fn normalize(&self, value: Value) -> Value {
        if self.options.flatten_lists {
            flatten_list_of_maps(value)
        } else {
            value
        }
    }
}

/// Assemble with default options
pub fn assemble(
    definition: &Value,
    external_values: HashMap<String, Content>,
    registry: Arc<RunnerRegistry>,
) -> PipewrightResult<Pipeline> {
    Assembler::new(registry).assemble(definition, external_values)
}

/// Parse a definition tree from YAML
pub fn parse_definition(yaml: &str) -> PipewrightResult<Value> {
    serde_yaml::from_str(yaml).map_err(Into::into)
}

/// Load a definition tree from a YAML file
pub fn load_definition(path: &Path) -> PipewrightResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| PipewrightError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_definition(&content)
}

/// Merge a list of single-key mappings into one mapping
///
/// Anything else is returned unchanged.
fn flatten_list_of_maps(value: Value) -> Value {
    let Value::Sequence(items) = value else {
        return value;
    };

    let all_single = items
        .iter()
        .all(|item| matches!(item, Value::Mapping(m) if m.len() == 1));
    if !all_single {
        return Value::Sequence(items);
    }

    let mut merged = Mapping::new();
    for item in items {
        if let Value::Mapping(m) = item {
            merged.extend(m);
        }
    }
    Value::Mapping(merged)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_string(item).ok_or_else(|| "must contain only names".to_string()))
            .collect(),
        _ => Err("must be a list of names".into()),
    }
}

/// Component inputs: a `param: reference` mapping or a list of references
fn input_refs(value: &Value) -> Result<Vec<(String, String)>, String> {
    match value {
        Value::Mapping(m) => m
            .iter()
            .map(|(param, reference)| {
                match (scalar_string(param), scalar_string(reference)) {
                    (Some(p), Some(r)) => Ok((p, r)),
                    _ => Err("must map parameter names to reference strings".to_string()),
                }
            })
            .collect(),
        other => string_list(other).map(|refs| refs.into_iter().map(|r| (r.clone(), r)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ML_PIPELINE: &str = r#"
pipeline:
  name: ml
  inputs: [raw]
  outputs: [train.model]
  components:
    - train:
        runner: noop
        inputs:
          data: clean.clean_data
        outputs: [model]
    - clean:
        runner: noop
        inputs:
          raw: raw
        outputs: [clean_data]
"#;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, Content> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Content::from(*v)))
            .collect()
    }

    fn registry() -> Arc<RunnerRegistry> {
        Arc::new(RunnerRegistry::with_builtins())
    }

    #[test]
    fn test_assemble_ml_pipeline() {
        let definition = parse_definition(ML_PIPELINE).unwrap();
        let pipeline = assemble(&definition, values(&[("raw", "x")]), registry()).unwrap();

        assert_eq!(pipeline.name(), "ml");
        assert_eq!(pipeline.task_names(), vec!["train", "clean"]);
        assert_eq!(pipeline.external_input("raw").unwrap().content().as_str(), Some("x"));
        assert_eq!(pipeline.expected_outputs(), ["train.model".to_string()]);
        assert_eq!(
            pipeline.get_task("train").unwrap().input_refs(),
            [("data".to_string(), "clean.clean_data".to_string())]
        );
    }

    #[tokio::test]
    async fn test_assembled_pipeline_runs() {
        let definition = parse_definition(ML_PIPELINE).unwrap();
        let pipeline = assemble(&definition, values(&[("raw", "x")]), registry()).unwrap();

        let outcome = pipeline.run().await.unwrap();
        assert_eq!(outcome.execution_order, vec!["clean", "train"]);
        assert_eq!(outcome.get("train.model").unwrap().content().as_str(), Some("x"));
    }

    #[test]
    fn test_root_key_is_optional() {
        let definition = parse_definition(
            "name: bare\ninputs: []\noutputs: []\ncomponents:\n  - a: {runner: noop, inputs: {}, outputs: [o]}\n",
        )
        .unwrap();

        let pipeline = assemble(&definition, HashMap::new(), registry()).unwrap();
        assert_eq!(pipeline.name(), "bare");
    }

    #[test]
    fn test_missing_pipeline_keys() {
        let definition = parse_definition("pipeline:\n  name: x\n  inputs: []\n").unwrap();

        match assemble(&definition, HashMap::new(), registry()) {
            Err(PipewrightError::InvalidDefinition { reason, .. }) => {
                assert!(reason.contains("outputs, components"));
            }
            other => panic!("expected invalid definition, got {other:?}"),
        }
    }

    #[test]
    fn test_component_must_have_single_key() {
        let definition = parse_definition(
            r#"
name: x
inputs: []
outputs: []
components:
  - a: {runner: noop, inputs: {}, outputs: [o]}
    b: {runner: noop, inputs: {}, outputs: [o]}
"#,
        )
        .unwrap();

        assert!(matches!(
            assemble(&definition, HashMap::new(), registry()),
            Err(PipewrightError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_component_missing_runner() {
        let definition = parse_definition(
            "name: x\ninputs: []\noutputs: []\ncomponents:\n  - a: {inputs: {}, outputs: [o]}\n",
        )
        .unwrap();

        match assemble(&definition, HashMap::new(), registry()) {
            Err(PipewrightError::InvalidTaskDefinition { task, reason }) => {
                assert_eq!(task, "a");
                assert!(reason.contains("runner"));
            }
            other => panic!("expected invalid task, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_pipeline_input() {
        let definition = parse_definition(ML_PIPELINE).unwrap();

        match assemble(&definition, HashMap::new(), registry()) {
            Err(PipewrightError::MissingPipelineInput { name }) => assert_eq!(name, "raw"),
            other => panic!("expected missing input, got {other:?}"),
        }
    }

    #[test]
    fn test_allow_missing_inputs_uses_placeholder() {
        let definition = parse_definition(ML_PIPELINE).unwrap();
        let pipeline = Assembler::new(registry())
            .with_options(AssembleOptions {
                allow_missing_inputs: true,
                ..Default::default()
            })
            .assemble(&definition, HashMap::new())
            .unwrap();

        assert_eq!(pipeline.external_input("raw").unwrap().content().as_str(), Some(""));
    }

    #[test]
    fn test_extra_values_ignored() {
        let definition = parse_definition(ML_PIPELINE).unwrap();
        let pipeline =
            assemble(&definition, values(&[("raw", "x"), ("unused", "y")]), registry()).unwrap();
        assert!(pipeline.external_input("unused").is_none());
    }

    #[test]
    fn test_list_inputs_use_reference_as_param() {
        let definition = parse_definition(
            "name: x\ninputs: [raw]\noutputs: []\ncomponents:\n  - a: {runner: noop, inputs: [raw], outputs: [o]}\n",
        )
        .unwrap();

        let pipeline = assemble(&definition, values(&[("raw", "v")]), registry()).unwrap();
        assert_eq!(
            pipeline.get_task("a").unwrap().input_refs(),
            [("raw".to_string(), "raw".to_string())]
        );
    }

    #[test]
    fn test_flatten_lists_layout() {
        let definition = parse_definition(
            r#"
pipeline:
  - name: legacy
  - inputs: [raw]
  - outputs: [clean.data]
  - components:
      - clean:
          - runner: noop
          - inputs:
              - raw_data: raw
          - outputs: [data]
      - train:
          - runner: noop
          - inputs: [clean.data]
          - outputs: [model]
"#,
        )
        .unwrap();

        // rejected without the option
        assert!(assemble(&definition, values(&[("raw", "x")]), registry()).is_err());

        let pipeline = Assembler::new(registry())
            .with_options(AssembleOptions {
                flatten_lists: true,
                ..Default::default()
            })
            .assemble(&definition, values(&[("raw", "x")]))
            .unwrap();
        assert_eq!(pipeline.name(), "legacy");
        assert_eq!(pipeline.get_task("clean").unwrap().runner_type(), "noop");
        assert_eq!(
            pipeline.get_task("clean").unwrap().input_refs(),
            [("raw_data".to_string(), "raw".to_string())]
        );
        // a plain list of names still means param = reference
        assert_eq!(
            pipeline.get_task("train").unwrap().input_refs(),
            [("clean.data".to_string(), "clean.data".to_string())]
        );
    }

    #[test]
    fn test_input_declared_twice_is_duplicate() {
        let definition = parse_definition(
            "name: x\ninputs: [raw, raw]\noutputs: []\ncomponents:\n  - a: {runner: noop, inputs: [raw], outputs: [o]}\n",
        )
        .unwrap();

        match assemble(&definition, values(&[("raw", "v")]), registry()) {
            Err(PipewrightError::DuplicateOutputDefinition { full_name, .. }) => {
                assert_eq!(full_name, "raw");
            }
            other => panic!("expected duplicate input, got {other:?}"),
        }
    }

    #[test]
    fn test_params_reach_runner_config() {
        let definition = parse_definition(
            r#"
name: x
inputs: []
outputs: [hello.greeting]
components:
  - hello:
      runner: shell
      inputs: {}
      outputs: [greeting]
      params:
        command: echo hi
"#,
        )
        .unwrap();

        let pipeline = assemble(&definition, HashMap::new(), registry()).unwrap();
        let config = pipeline.get_task("hello").unwrap().runner_config();
        assert_eq!(config.param_str("command"), Some("echo hi"));
    }
}
