// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Consumables
//!
//! A consumable is a named, immutable piece of data flowing between tasks.
//! Its full name (`task.output`, or the bare name for pipeline inputs) is the
//! key used to wire the task graph.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{PipewrightError, PipewrightResult};

/// Consumables keyed by name
pub type Consumables = HashMap<String, Consumable>;

/// Opaque payload of a consumable
///
/// The engine never looks inside; runners downcast to whatever type they
/// agreed on. Clones share the same value read-only.
#[derive(Clone)]
pub struct Content(Arc<dyn Any + Send + Sync>);

impl Content {
    /// Wrap any value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value as `T`, if that is what it holds
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Borrow string content
    pub fn as_str(&self) -> Option<&str> {
        if let Some(s) = self.downcast_ref::<String>() {
            return Some(s.as_str());
        }
        self.downcast_ref::<&'static str>().copied()
    }

    /// Whether two handles point at the same value
    pub fn ptr_eq(&self, other: &Content) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.debug_tuple("Content").field(&s).finish(),
            None => f.write_str("Content(<opaque>)"),
        }
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

/// Named carrier of task inputs and outputs
#[derive(Debug, Clone)]
pub struct Consumable {
    name: String,
    content: Content,
    parent_task_name: Option<String>,
}

impl Consumable {
    /// Create a consumable with no producing task (a pipeline input)
    pub fn new(name: impl Into<String>, content: impl Into<Content>) -> PipewrightResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipewrightError::InvalidConsumable {
                reason: "name must not be empty".into(),
            });
        }

        Ok(Self {
            name,
            content: content.into(),
            parent_task_name: None,
        })
    }

    /// Re-scope this consumable under the task that produced it
    ///
    /// An empty task name keeps it unscoped.
    pub fn produced_by(self, task_name: impl Into<String>) -> Self {
        let task_name = task_name.into();
        Self {
            parent_task_name: (!task_name.is_empty()).then_some(task_name),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn parent_task_name(&self) -> Option<&str> {
        self.parent_task_name.as_deref()
    }

    /// True for externally supplied pipeline inputs
    pub fn is_external(&self) -> bool {
        self.parent_task_name.is_none()
    }

    /// Dotted identifier used for dependency lookup
    pub fn full_name(&self) -> String {
        full_name(self.parent_task_name.as_deref(), &self.name)
    }
}

/// Join a producer and an output name the way consumables are addressed
pub fn full_name(parent_task_name: Option<&str>, name: &str) -> String {
    match parent_task_name {
        Some(parent) if !parent.is_empty() => format!("{}.{}", parent, name),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_full_name_is_bare() {
        let raw = Consumable::new("raw", "x").unwrap();
        assert_eq!(raw.full_name(), "raw");
        assert!(raw.is_external());
    }

    #[test]
    fn test_produced_full_name_is_dotted() {
        let model = Consumable::new("model", "weights").unwrap().produced_by("train");
        assert_eq!(model.full_name(), "train.model");
        assert_eq!(model.parent_task_name(), Some("train"));
        assert!(!model.is_external());
    }

    #[test]
    fn test_empty_parent_means_external() {
        let c = Consumable::new("raw", "x").unwrap().produced_by("");
        assert!(c.is_external());
        assert_eq!(c.full_name(), "raw");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            Consumable::new("", "x"),
            Err(PipewrightError::InvalidConsumable { .. })
        ));
    }

    #[test]
    fn test_content_is_shared_not_copied() {
        let a = Consumable::new("data", Content::new(vec![1u8, 2, 3])).unwrap();
        let b = a.clone().produced_by("clean");
        assert!(a.content().ptr_eq(b.content()));
        assert_eq!(b.content().downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
        assert!(b.content().as_str().is_none());
    }
}
