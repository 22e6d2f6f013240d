//! Recognized task taxonomy
//!
//! The taxonomy is a read-only table loaded once at startup and shared by
//! reference with the prompt builder and the classifier. It constrains the
//! `task` the LLM may choose and supplies `taskSummary` after parsing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Task table compiled into the binary
const BUILTIN_TASKS: &str = include_str!("../data/tasks.yaml");

/// A recognized task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Canonical task name, e.g. `text-to-image`
    pub name: String,

    /// One-line summary
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    tasks: Vec<TaskSpec>,
}

/// Ordered set of recognized tasks
#[derive(Debug, Clone)]
pub struct TaskTaxonomy {
    tasks: Vec<TaskSpec>,
    index: HashMap<String, usize>,
}

impl TaskTaxonomy {
    /// Build a taxonomy from tasks in display order
    ///
    /// Duplicate names are rejected; the prompt would otherwise offer the
    /// same choice twice with different summaries.
    pub fn new(tasks: Vec<TaskSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                return Err(Error::config("task taxonomy contains an empty task name"));
            }
            if index.insert(task.name.clone(), position).is_some() {
                return Err(Error::config(format!(
                    "task taxonomy lists '{}' more than once",
                    task.name
                )));
            }
        }
        Ok(Self { tasks, index })
    }

    /// Parse a taxonomy from YAML (`tasks: [{name, summary}, ...]`)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: TaxonomyFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid task taxonomy: {}", e)))?;
        Self::new(file.tasks)
    }

    /// Load a taxonomy from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// The task table shipped with taskscope
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_TASKS)
    }

    /// Summary for a recognized task name
    pub fn summary(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&position| self.tasks[position].summary.as_str())
    }

    /// Whether `name` is a recognized task
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tasks in display order
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Task names in display order
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of recognized tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the taxonomy is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// JSON object `name -> {summary}` in display order
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let mut entry = Map::new();
            entry.insert("summary".to_string(), Value::String(task.summary.clone()));
            map.insert(task.name.clone(), Value::Object(entry));
        }
        Value::Object(map)
    }
}
