//! Error taxonomy for loading, graph validation and task execution

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, WeaveError>;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Malformed host table or config section
    #[error("config error: {0}")]
    Config(String),

    /// The task source could not be evaluated
    #[error("failure loading {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },

    /// A root or dependency name is absent from the registry
    #[error("{}", unknown_task_message(.name, .required_by.as_deref()))]
    UnknownTask {
        name: String,
        required_by: Option<String>,
    },

    /// The resolved graph contains a cycle; carries one concrete cyclic path
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A task body returned an error or panicked
    #[error("task {task:?} failed: {message}")]
    TaskBody { task: String, message: String },

    /// An external process or transfer exited non-zero or could not launch
    #[error("{op} failed with exit code {code}{}", stderr_suffix(.stderr))]
    Operation {
        op: String,
        code: i32,
        stderr: String,
    },

    /// Unresolvable host alias or malformed call shape
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Internal scheduling failure (worker join or semaphore)
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl WeaveError {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Load { .. } => "load",
            Self::UnknownTask { .. } => "unknown_task",
            Self::Cycle(_) => "cycle",
            Self::TaskBody { .. } => "task_body",
            Self::Operation { .. } => "operation",
            Self::Argument(_) => "argument",
            Self::Scheduler(_) => "scheduler",
        }
    }
}

fn unknown_task_message(name: &str, required_by: Option<&str>) -> String {
    match required_by {
        Some(parent) => format!("unknown dependency {:?} of task {:?}", name, parent),
        None => format!("unknown task {:?}", name),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
