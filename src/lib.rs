//! Weave - task orchestration engine
//!
//! Named tasks declare their dependencies and a body that runs shell
//! commands, remote commands over ssh, or rsync mirrors. The engine resolves
//! the dependency graph for a requested task and runs it level by level with
//! bounded parallelism, publishing lifecycle and operation events on a bus.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod events;
pub mod observer;
pub mod ops;
pub mod script;
pub mod source;

// Re-exports
pub use config::{Host, HostConfig};
pub use crate::core::{Registry, Runnable, TaskExecutor, TaskGraph, TaskOptions};
pub use engine::{Engine, EngineOptions};
pub use error::{Result, WeaveError};
pub use events::{Event, EventBus, EventKind, Level, OpKind};
pub use ops::{OperationResult, TaskContext};
pub use source::{FileSource, StaticSource, TaskSource, Weavefile};
