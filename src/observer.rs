//! Bus observers that turn events into log records or JSON lines

use crate::events::{Event, EventBus, EventKind, Level, OpTarget, Unsubscribe};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Log target used for messages emitted by task bodies
pub const TASK_LOG_TARGET: &str = "weave::task";

/// Routes events through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn attach(bus: &EventBus) -> Unsubscribe {
        bus.subscribe(|event| LogObserver.handle(event))
    }

    pub fn handle(&self, event: &Event) {
        let task = &event.task;
        match &event.kind {
            EventKind::TaskStart => log::debug!("task start task={}", task),
            EventKind::TaskEnd { ok: true, duration } => {
                log::debug!("task end task={} ok=true duration_ms={}", task, duration.as_millis())
            }
            EventKind::TaskEnd { ok: false, duration } => {
                log::warn!("task failed task={} duration_ms={}", task, duration.as_millis())
            }
            EventKind::OpStart { op, host, target } => match target {
                OpTarget::Command { command } => {
                    log::debug!("op start task={} op={} host={} cmd={:?}", task, op, host, command)
                }
                OpTarget::Transfer { src, dst } => {
                    log::debug!("op start task={} op={} host={} src={} dst={}", task, op, host, src, dst)
                }
            },
            EventKind::OpEnd {
                op,
                ok,
                code,
                duration,
                ..
            } => log::debug!(
                "op end task={} op={} ok={} code={} duration_ms={}",
                task,
                op,
                ok,
                code,
                duration.as_millis()
            ),
            EventKind::Message {
                level,
                text,
                attributes,
            } => {
                let line = format_message(task, text, attributes);
                log::log!(target: TASK_LOG_TARGET, to_log_level(*level), "{}", line);
            }
        }
    }
}

fn to_log_level(level: Level) -> log::Level {
    match level {
        Level::Debug => log::Level::Debug,
        Level::Info => log::Level::Info,
        Level::Warn => log::Level::Warn,
        Level::Error => log::Level::Error,
    }
}

fn format_message(task: &str, text: &str, attributes: &[(String, String)]) -> String {
    let mut line = format!("[{}] {}", task, text);
    for (key, value) in attributes {
        if value.contains(char::is_whitespace) {
            line.push_str(&format!(" {}={:?}", key, value));
        } else {
            line.push_str(&format!(" {}={}", key, value));
        }
    }
    line
}

/// Writes every event as one JSON object per line
pub struct JsonObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn attach(self, bus: &EventBus) -> Unsubscribe {
        let this = Arc::new(self);
        bus.subscribe(move |event| this.handle(event))
    }

    pub fn handle(&self, event: &Event) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{}", event.to_json_line()) {
            log::warn!("failed to write event: {}", e);
        }
    }
}

impl JsonObserver<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}
