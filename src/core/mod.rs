//! Core engine - task registry, graph resolution, scheduling and execution

mod executor;
mod graph;
mod scheduler;
mod task;

pub use executor::TaskExecutor;
pub use graph::TaskGraph;
pub use scheduler::{run_graph, TaskRunner};
pub use task::{NativeFn, Registry, Runnable, Task, TaskOptions};
