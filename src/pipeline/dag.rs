// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Task dependency graph
//!
//! Resolves every input reference to its producer, builds the task DAG and
//! computes a stable execution order: tasks with no ordering constraint
//! between them keep their declaration order.

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::errors::{PipewrightError, PipewrightResult};
use crate::pipeline::Pipeline;

/// Who produces a consumable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Producer {
    /// Supplied from outside the pipeline
    External,
    /// Output of the named task
    Task(String),
}

impl Producer {
    fn describe(&self) -> String {
        match self {
            Self::External => "pipeline input".to_string(),
            Self::Task(name) => name.clone(),
        }
    }
}

/// Resolved dependency graph of a pipeline
///
/// Node `i` is the `i`-th declared task; an edge `b → a` means `a` reads an
/// output of `b`.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<usize, ()>,
    names: Vec<String>,
    name_to_index: HashMap<String, NodeIndex>,
    producers: HashMap<String, Producer>,
    order: Vec<usize>,
}

impl TaskGraph {
    /// Resolve a pipeline into a graph
    pub fn build(pipeline: &Pipeline) -> PipewrightResult<Self> {
        let producers = Self::producer_table(pipeline)?;

        let mut graph = DiGraph::new();
        let mut names = Vec::with_capacity(pipeline.tasks().len());
        let mut name_to_index = HashMap::new();

        for (idx, task) in pipeline.tasks().iter().enumerate() {
            let node = graph.add_node(idx);
            names.push(task.name().to_string());
            name_to_index.insert(task.name().to_string(), node);
        }

        for task in pipeline.tasks() {
            let node = name_to_index[task.name()];

            for (_, reference) in task.input_refs() {
                match producers.get(reference) {
                    None => {
                        return Err(PipewrightError::UnresolvedReference {
                            task: task.name().to_string(),
                            reference: reference.clone(),
                        });
                    }
                    Some(Producer::External) => {}
                    Some(Producer::Task(producer)) if producer == task.name() => {
                        return Err(PipewrightError::CyclicDependency {
                            task: task.name().to_string(),
                            cycle: vec![task.name().to_string()],
                        });
                    }
                    Some(Producer::Task(producer)) => {
                        let dep_node = name_to_index[producer];
                        if !graph.contains_edge(dep_node, node) {
                            graph.add_edge(dep_node, node, ());
                        }
                    }
                }
            }
        }

        let mut dag = Self {
            graph,
            names,
            name_to_index,
            producers,
            order: Vec::new(),
        };
        dag.order = dag.stable_order()?;

        tracing::debug!(
            tasks = dag.names.len(),
            edges = dag.graph.edge_count(),
            "resolved task graph"
        );

        Ok(dag)
    }

    /// Map every consumable full name to its producer
    fn producer_table(pipeline: &Pipeline) -> PipewrightResult<HashMap<String, Producer>> {
        let mut producers: HashMap<String, Producer> = HashMap::new();

        let external = pipeline
            .external_inputs()
            .iter()
            .map(|input| (input.full_name(), Producer::External));

        let produced = pipeline.tasks().iter().flat_map(|task| {
            task.output_full_names()
                .map(move |full_name| (full_name, Producer::Task(task.name().to_string())))
        });

        for (full_name, producer) in external.chain(produced) {
            if let Some(existing) = producers.get(&full_name) {
                return Err(PipewrightError::DuplicateOutputDefinition {
                    full_name,
                    first: existing.describe(),
                    second: producer.describe(),
                });
            }
            producers.insert(full_name, producer);
        }

        Ok(producers)
    }

    /// Kahn's algorithm, always releasing the lowest declaration index first
    fn stable_order(&self) -> PipewrightResult<Vec<usize>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for next in self.graph.neighbors_directed(NodeIndex::new(idx), Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        if order.len() < self.names.len() {
            return Err(self.cycle_error());
        }

        Ok(order)
    }

    /// Describe the cycle containing the earliest declared task on any cycle
    fn cycle_error(&self) -> PipewrightError {
        let mut cycle: Vec<usize> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| component.into_iter().map(|n| n.index()).collect::<Vec<_>>())
            .min_by_key(|members| members.iter().copied().min().unwrap_or(usize::MAX))
            .unwrap_or_default();
        cycle.sort_unstable();

        let cycle: Vec<String> = cycle.into_iter().map(|idx| self.names[idx].clone()).collect();
        let task = cycle.first().cloned().unwrap_or_default();

        PipewrightError::CyclicDependency { task, cycle }
    }

    /// Task indices in execution order
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    /// Task names in execution order
    pub fn execution_order_names(&self) -> Vec<&str> {
        self.order.iter().map(|&idx| self.names[idx].as_str()).collect()
    }

    /// Declaration index of a task
    pub fn task_index(&self, task_name: &str) -> Option<usize> {
        self.name_to_index.get(task_name).map(|n| n.index())
    }

    /// Who produces a consumable
    pub fn producer_of(&self, full_name: &str) -> Option<&Producer> {
        self.producers.get(full_name)
    }

    /// Tasks that must run before the given one, in declaration order
    pub fn dependencies(&self, task_name: &str) -> Option<Vec<String>> {
        self.neighbors(task_name, Direction::Incoming)
    }

    /// Tasks that read the given task's outputs, in declaration order
    pub fn dependents(&self, task_name: &str) -> Option<Vec<String>> {
        self.neighbors(task_name, Direction::Outgoing)
    }

    pub(crate) fn dependency_indices(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors_directed(NodeIndex::new(idx), Direction::Incoming)
            .map(|n| n.index())
    }

    pub(crate) fn dependent_indices(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            .map(|n| n.index())
    }

    fn neighbors(&self, task_name: &str, direction: Direction) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task_name)?;
        let mut indices: Vec<usize> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| n.index())
            .collect();
        indices.sort_unstable();
        Some(indices.into_iter().map(|idx| self.names[idx].clone()).collect())
    }

    /// Check if task A depends (directly or transitively) on task B
    pub fn depends_on(&self, task_a: &str, task_b: &str) -> bool {
        let (Some(node_a), Some(node_b)) =
            (self.name_to_index.get(task_a), self.name_to_index.get(task_b))
        else {
            return false;
        };

        node_a != node_b && has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for name in &self.names {
            out.push_str(&format!("    {}[{}]\n", name, name));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    {} --> {}\n",
                self.names[edge.source().index()],
                self.names[edge.target().index()]
            ));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                self.names[edge.source().index()],
                self.names[edge.target().index()]
            ));
        }

        // Isolated tasks have no edge to carry them
        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).next().is_none() {
                out.push_str(&format!("    \"{}\";\n", self.names[node.index()]));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> String {
        let mut out = String::new();

        for (i, &idx) in self.order.iter().enumerate() {
            let task = &pipeline.tasks()[idx];
            let deps = self.dependencies(task.name()).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, task.name(), task.runner_type()));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumable::Consumable;
    use crate::pipeline::TaskFactory;
    use crate::runners::RunnerRegistry;
    use std::sync::Arc;

    /// `(task, [(param, reference)], [outputs])`
    type TaskSpec<'a> = (&'a str, Vec<(&'a str, &'a str)>, Vec<&'a str>);

    fn make_test_pipeline(inputs: &[&str], tasks: Vec<TaskSpec>) -> Pipeline {
        let mut pipeline = Pipeline::new("test", Arc::new(RunnerRegistry::new()));

        for input in inputs {
            pipeline.add_input(Consumable::new(*input, "v").unwrap()).unwrap();
        }

        for (name, refs, outputs) in tasks {
            let task = TaskFactory::new()
                .spawn(
                    name,
                    "noop",
                    refs.into_iter().map(|(p, r)| (p.to_string(), r.to_string())),
                    outputs.into_iter().map(String::from),
                )
                .unwrap();
            pipeline.add_task(task).unwrap();
        }

        pipeline
    }

    #[test]
    fn test_linear_dag_runs_producer_first() {
        // declared consumer-first on purpose
        let pipeline = make_test_pipeline(
            &["raw"],
            vec![
                ("train", vec![("data", "clean.clean_data")], vec!["model"]),
                ("clean", vec![("raw", "raw")], vec!["clean_data"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();
        assert_eq!(dag.execution_order_names(), vec!["clean", "train"]);
        assert_eq!(dag.producer_of("raw"), Some(&Producer::External));
        assert_eq!(
            dag.producer_of("clean.clean_data"),
            Some(&Producer::Task("clean".into()))
        );
    }

    #[test]
    fn test_independent_tasks_keep_declaration_order() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("b", vec![], vec!["out"]),
                ("a", vec![], vec!["out"]),
                ("c", vec![], vec!["out"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();
        assert_eq!(dag.execution_order_names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_diamond_dag_is_stable() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("d", vec![("l", "b.o"), ("r", "c.o")], vec!["o"]),
                ("c", vec![("x", "a.o")], vec!["o"]),
                ("b", vec![("x", "a.o")], vec!["o"]),
                ("a", vec![], vec!["o"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();
        // c is declared before b, so it is released first once a is done
        assert_eq!(dag.execution_order_names(), vec!["a", "c", "b", "d"]);
        assert_eq!(dag.dependencies("d").unwrap(), vec!["c", "b"]);
        assert_eq!(dag.dependents("a").unwrap(), vec!["c", "b"]);
    }

    #[test]
    fn test_order_is_linear_extension() {
        let pipeline = make_test_pipeline(
            &["seed"],
            vec![
                ("e", vec![("x", "d.o"), ("y", "b.o")], vec!["o"]),
                ("d", vec![("x", "c.o")], vec!["o"]),
                ("c", vec![("x", "a.o")], vec!["o"]),
                ("b", vec![("x", "seed")], vec!["o"]),
                ("a", vec![("x", "b.o")], vec!["o"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();
        let order = dag.execution_order_names();
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();

        for task in pipeline.tasks() {
            for dep in dag.dependencies(task.name()).unwrap() {
                assert!(position(&dep) < position(task.name()));
            }
        }
    }

    #[test]
    fn test_two_task_cycle() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("x", vec![("in", "y.o")], vec!["o"]),
                ("y", vec![("in", "x.o")], vec!["o"]),
            ],
        );

        match TaskGraph::build(&pipeline) {
            Err(PipewrightError::CyclicDependency { task, cycle }) => {
                assert_eq!(task, "x");
                assert_eq!(cycle, vec!["x", "y"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reported_on_cycle_not_downstream() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("sink", vec![("in", "q.o")], vec!["o"]),
                ("p", vec![("in", "r.o")], vec!["o"]),
                ("q", vec![("in", "p.o")], vec!["o"]),
                ("r", vec![("in", "q.o")], vec!["o"]),
            ],
        );

        match TaskGraph::build(&pipeline) {
            Err(PipewrightError::CyclicDependency { task, cycle }) => {
                assert_eq!(task, "p");
                assert_eq!(cycle, vec!["p", "q", "r"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let pipeline = make_test_pipeline(&[], vec![("loop", vec![("in", "loop.o")], vec!["o"])]);

        assert!(matches!(
            TaskGraph::build(&pipeline),
            Err(PipewrightError::CyclicDependency { ref task, .. }) if task == "loop"
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let pipeline =
            make_test_pipeline(&["raw"], vec![("clean", vec![("in", "missing")], vec!["o"])]);

        match TaskGraph::build(&pipeline) {
            Err(PipewrightError::UnresolvedReference { task, reference }) => {
                assert_eq!(task, "clean");
                assert_eq!(reference, "missing");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_to_undeclared_output() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("a", vec![], vec!["o"]),
                ("b", vec![("in", "a.other")], vec!["o"]),
            ],
        );

        assert!(matches!(
            TaskGraph::build(&pipeline),
            Err(PipewrightError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_duplicate_output_definition() {
        // an input literally named like a task output
        let pipeline = make_test_pipeline(&["a.o"], vec![("a", vec![], vec!["o"])]);

        match TaskGraph::build(&pipeline) {
            Err(PipewrightError::DuplicateOutputDefinition {
                full_name,
                first,
                second,
            }) => {
                assert_eq!(full_name, "a.o");
                assert_eq!(first, "pipeline input");
                assert_eq!(second, "a");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn test_depends_on_check() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("a", vec![], vec!["o"]),
                ("b", vec![("in", "a.o")], vec!["o"]),
                ("c", vec![("in", "b.o")], vec!["o"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();

        assert!(dag.depends_on("c", "a")); // transitive
        assert!(dag.depends_on("c", "b")); // direct
        assert!(!dag.depends_on("a", "c")); // reverse
        assert!(!dag.depends_on("a", "a"));
    }

    #[test]
    fn test_renderers() {
        let pipeline = make_test_pipeline(
            &[],
            vec![
                ("a", vec![], vec!["o"]),
                ("b", vec![("in", "a.o")], vec!["o"]),
                ("lonely", vec![], vec!["o"]),
            ],
        );

        let dag = TaskGraph::build(&pipeline).unwrap();

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("a --> b"));

        let dot = dag.to_dot();
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("    \"lonely\";\n"));

        assert_eq!(
            dag.to_text(&pipeline),
            "1. a (noop)\n2. b (noop) [depends: a]\n3. lonely (noop)\n"
        );
    }
}
