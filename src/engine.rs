//! Engine - loads a task source and runs dependency graphs from it

use crate::config::HostConfig;
use crate::core::{run_graph, TaskExecutor, TaskGraph, TaskRunner};
use crate::error::Result;
use crate::events::EventBus;
use crate::ops::process::{Launcher, SystemLauncher};
use crate::source::{FileSource, TaskSource, Weavefile};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of tasks run in parallel
pub const DEFAULT_WORKERS: usize = 2;

/// Runtime options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum tasks in flight within one batch; values below 1 mean 1
    pub max_workers: usize,
    /// Emit operation events without executing anything
    pub dry_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_WORKERS,
            dry_run: false,
        }
    }
}

/// Task orchestration engine
pub struct Engine {
    options: EngineOptions,
    source: Arc<dyn TaskSource>,
    bus: EventBus,
    launcher: Arc<dyn Launcher>,
    loaded: Option<Weavefile>,
}

impl Engine {
    /// Create an engine over any task source
    pub fn new(source: Arc<dyn TaskSource>, options: EngineOptions) -> Self {
        Self {
            options,
            source,
            bus: EventBus::new(),
            launcher: Arc::new(SystemLauncher),
            loaded: None,
        }
    }

    /// Create an engine reading a YAML Weavefile
    pub fn from_file(path: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self::new(Arc::new(FileSource::new(path)), options)
    }

    /// Replace the process launcher
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Event bus observers subscribe to
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Evaluate the source, replacing any previously loaded definitions
    ///
    /// On failure the previous definitions are kept.
    pub fn load(&mut self) -> Result<()> {
        let loaded = self.source.load()?;
        log::debug!(
            "loaded {} tasks and {} hosts from {}",
            loaded.tasks.len(),
            loaded.hosts.len(),
            self.source.describe()
        );
        self.loaded = Some(loaded);
        Ok(())
    }

    /// Registered task names, sorted
    pub fn task_names(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|w| w.tasks.names())
            .unwrap_or_default()
    }

    /// Host table from the last load
    pub fn hosts(&self) -> Option<&HostConfig> {
        self.loaded.as_ref().map(|w| &w.hosts)
    }

    /// Resolve and validate the graph rooted at `root`
    pub fn graph(&self, root: &str) -> Result<TaskGraph> {
        let loaded = self.definitions()?;
        let graph = TaskGraph::resolve(&loaded.tasks, root)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Execute `root` and everything it depends on
    pub async fn run(&self, root: &str) -> Result<()> {
        let graph = self.graph(root)?;
        log::debug!(
            "running {} ({} tasks, {} workers{})",
            root,
            graph.len(),
            self.options.max_workers.max(1),
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let executor: Arc<dyn TaskRunner> = Arc::new(TaskExecutor::new(
            self.source.clone(),
            self.bus.clone(),
            self.launcher.clone(),
            self.options.dry_run,
        ));

        run_graph(executor, &graph, self.options.max_workers).await
    }

    fn definitions(&self) -> Result<Cow<'_, Weavefile>> {
        match &self.loaded {
            Some(loaded) => Ok(Cow::Borrowed(loaded)),
            None => Ok(Cow::Owned(self.source.load()?)),
        }
    }
}
