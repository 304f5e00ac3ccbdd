//! Task Executor - runs one task in its own execution environment
//!
//! Every invocation re-evaluates the task source, so concurrently running
//! tasks never share a registry, host table or context. TaskStart and
//! TaskEnd are emitted around the body whatever its outcome.

use super::scheduler::TaskRunner;
use crate::error::{Result, WeaveError};
use crate::events::{Event, EventBus, EventKind};
use crate::ops::process::Launcher;
use crate::ops::{OperationRunner, TaskContext};
use crate::source::TaskSource;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Executes named tasks with per-task isolation
#[derive(Clone)]
pub struct TaskExecutor {
    source: Arc<dyn TaskSource>,
    bus: EventBus,
    launcher: Arc<dyn Launcher>,
    dry_run: bool,
}

impl TaskExecutor {
    pub fn new(
        source: Arc<dyn TaskSource>,
        bus: EventBus,
        launcher: Arc<dyn Launcher>,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            bus,
            launcher,
            dry_run,
        }
    }

    /// Execute one task by name
    pub fn execute(&self, name: &str) -> Result<()> {
        let env = self.source.load()?;

        let Some(task) = env.tasks.get(name) else {
            return Err(WeaveError::UnknownTask {
                name: name.to_string(),
                required_by: None,
            });
        };

        let ops = OperationRunner::new(
            env.hosts.clone(),
            self.bus.clone(),
            self.launcher.clone(),
            self.dry_run,
        );
        let ctx = TaskContext::new(name, ops);

        log::debug!("starting task {}", name);
        let start = Instant::now();
        self.bus.emit(Event::now(name, EventKind::TaskStart));

        let outcome = match catch_unwind(AssertUnwindSafe(|| task.body.call(&ctx))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WeaveError::TaskBody {
                task: name.to_string(),
                message: format!("{:#}", e),
            }),
            Err(panic) => Err(WeaveError::TaskBody {
                task: name.to_string(),
                message: format!("panicked: {}", panic_message(panic.as_ref())),
            }),
        };

        let duration = start.elapsed();
        self.bus.emit(Event::now(
            name,
            EventKind::TaskEnd {
                ok: outcome.is_ok(),
                duration,
            },
        ));

        if let Err(e) = &outcome {
            log::debug!("task {} failed after {} ms: {}", name, duration.as_millis(), e);
        }

        outcome
    }
}

impl TaskRunner for TaskExecutor {
    fn run_task(&self, name: &str) -> Result<()> {
        self.execute(name)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
