//! Lifecycle and operation events
//!
//! JSON-serializable, one variant per kind so consumers match exhaustively.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Message severity for `log` calls from task bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Parse a level name; anything unrecognised falls back to info
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Side-effecting operation exposed to task bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Run,
    Sync,
    Fetch,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Sync => write!(f, "sync"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// What an operation acts on: a command, or a transfer source/destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OpTarget {
    Command { command: String },
    Transfer { src: String, dst: String },
}

/// Event payload, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TaskStart,
    TaskEnd {
        ok: bool,
        #[serde(rename = "duration_ms", serialize_with = "as_millis")]
        duration: Duration,
    },
    OpStart {
        op: OpKind,
        host: String,
        #[serde(flatten)]
        target: OpTarget,
    },
    OpEnd {
        op: OpKind,
        host: String,
        ok: bool,
        code: i32,
        #[serde(rename = "duration_ms", serialize_with = "as_millis")]
        duration: Duration,
        stdout_len: usize,
        stderr_len: usize,
    },
    Message {
        level: Level,
        text: String,
        attributes: Vec<(String, String)>,
    },
}

/// An immutable, fire-and-forget event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub task: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn now(task: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            task: task.into(),
            kind,
        }
    }

    /// Serialize to JSON line
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
