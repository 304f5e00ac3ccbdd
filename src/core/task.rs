//! Task definitions and the registry produced by one load of a task source

use crate::error::{Result, WeaveError};
use crate::ops::TaskContext;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An executable task body.
///
/// Implemented by scripted step lists and by native closures. Each call gets
/// the context of one isolated execution environment.
pub trait Runnable: Send + Sync {
    fn call(&self, ctx: &TaskContext) -> anyhow::Result<()>;
}

/// Native Rust closure as a task body
pub struct NativeFn<F>(pub F);

impl<F> Runnable for NativeFn<F>
where
    F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        (self.0)(ctx)
    }
}

/// Recognized registration options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskOptions {
    #[serde(default)]
    pub depends: Vec<String>,
}

impl TaskOptions {
    pub fn depends<I, S>(deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            depends: deps.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named unit of work
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub depends: Vec<String>,
    pub body: Arc<dyn Runnable>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("depends", &self.depends)
            .finish_non_exhaustive()
    }
}

/// Task registry - immutable once a load completes
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: BTreeMap<String, Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; names must be non-empty and unique
    pub fn register(
        &mut self,
        name: impl Into<String>,
        options: TaskOptions,
        body: Arc<dyn Runnable>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WeaveError::Argument("task name cannot be empty".into()));
        }
        if self.tasks.contains_key(&name) {
            return Err(WeaveError::Argument(format!(
                "task {:?} is already defined",
                name
            )));
        }
        if options.depends.iter().any(|d| d.trim().is_empty()) {
            return Err(WeaveError::Argument(format!(
                "task {:?}: depends must be a list of task names",
                name
            )));
        }

        self.tasks.insert(
            name.clone(),
            Task {
                name,
                depends: options.depends,
                body,
            },
        );
        Ok(())
    }

    /// Register a native closure
    pub fn register_fn<F>(&mut self, name: &str, depends: &[&str], body: F) -> Result<()>
    where
        F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(
            name,
            TaskOptions::depends(depends.iter().copied()),
            Arc::new(NativeFn(body)),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in lexicographic order
    pub fn names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
