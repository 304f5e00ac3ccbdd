//! Task sources - where registries and host tables come from
//!
//! A source is evaluated once per `Engine::load` and again for every task
//! execution, so each task runs against freshly built definitions.

use crate::config::HostConfig;
use crate::core::{Registry, TaskOptions};
use crate::error::{Result, WeaveError};
use crate::script::{self, Script, Step};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default Weavefile name
pub const DEFAULT_WEAVEFILE: &str = "Weavefile.yml";

/// Result of evaluating a task source
#[derive(Debug, Clone, Default)]
pub struct Weavefile {
    pub tasks: Registry,
    pub hosts: HostConfig,
}

/// Produces a fresh registry and host table on every call
pub trait TaskSource: Send + Sync {
    fn load(&self) -> Result<Weavefile>;

    /// Human readable origin, used in messages
    fn describe(&self) -> String;
}

/// YAML Weavefile on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskSource for FileSource {
    fn load(&self) -> Result<Weavefile> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| WeaveError::Load {
            source_name: self.describe(),
            message: e.to_string(),
        })?;
        parse_weavefile(&content).map_err(|e| match e {
            WeaveError::Load { message, .. } => WeaveError::Load {
                source_name: self.describe(),
                message,
            },
            other => other,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process source built by a factory closure
#[derive(Clone)]
pub struct StaticSource {
    name: String,
    factory: Arc<dyn Fn() -> Result<Weavefile> + Send + Sync>,
}

impl StaticSource {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Weavefile> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for StaticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TaskSource for StaticSource {
    fn load(&self) -> Result<Weavefile> {
        (self.factory)()
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    config: Option<serde_yaml::Value>,
    #[serde(default)]
    tasks: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskDecl {
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default, deserialize_with = "script::deserialize_steps")]
    steps: Vec<Step>,
}

/// Parse Weavefile YAML into a registry and host table
pub fn parse_weavefile(content: &str) -> Result<Weavefile> {
    let doc: Document = if content.trim().is_empty() {
        Document {
            config: None,
            tasks: BTreeMap::new(),
        }
    } else {
        serde_yaml::from_str(content).map_err(|e| WeaveError::Load {
            source_name: "weavefile".into(),
            message: e.to_string(),
        })?
    };

    let hosts = HostConfig::from_value(doc.config.as_ref())?;

    let mut tasks = Registry::new();
    for (name, value) in doc.tasks {
        let decl: TaskDecl = if value.is_null() {
            TaskDecl {
                depends: Vec::new(),
                steps: Vec::new(),
            }
        } else {
            serde_yaml::from_value(value)
                .map_err(|e| WeaveError::Argument(format!("task {:?}: {}", name, e)))?
        };

        tasks.register(
            name,
            TaskOptions {
                depends: decl.depends,
            },
            Arc::new(Script::new(decl.steps)),
        )?;
    }

    Ok(Weavefile { tasks, hosts })
}
