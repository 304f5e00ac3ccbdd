//! Operations - the side-effecting surface handed to task bodies
//!
//! `run` executes a command in the local shell or, given a host alias, over
//! ssh. `sync` pushes and `fetch` pulls with a deleting rsync mirror. Every
//! call is synchronous and brackets its work with OpStart/OpEnd events.

pub mod process;
pub mod transfer;

use crate::config::HostConfig;
use crate::error::{Result, WeaveError};
use crate::events::{Event, EventBus, EventKind, Level, OpKind, OpTarget};
use process::{Launcher, ProcessOutput};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use transfer::Endpoint;

/// Outcome of one operation, returned to the calling body as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    #[serde(skip)]
    pub op: OpKind,
    pub ok: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl OperationResult {
    fn from_output(op: OpKind, output: ProcessOutput) -> Self {
        Self {
            op,
            ok: output.success,
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    /// Synthetic success used when nothing was executed
    pub fn skipped(op: OpKind) -> Self {
        Self {
            op,
            ok: true,
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Failure detected before anything was launched
    pub fn failed(op: OpKind, message: impl Into<String>) -> Self {
        Self {
            op,
            ok: false,
            code: 1,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    /// Treat `ok: false` as fatal
    pub fn check(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(WeaveError::Operation {
                op: self.op.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes run/sync/fetch and emits Op events
#[derive(Clone)]
pub struct OperationRunner {
    hosts: HostConfig,
    bus: EventBus,
    launcher: Arc<dyn Launcher>,
    dry_run: bool,
}

impl std::fmt::Debug for OperationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRunner")
            .field("hosts", &self.hosts)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl OperationRunner {
    pub fn new(
        hosts: HostConfig,
        bus: EventBus,
        launcher: Arc<dyn Launcher>,
        dry_run: bool,
    ) -> Self {
        Self {
            hosts,
            bus,
            launcher,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run `command` locally, or on `host` when given.
    ///
    /// An unknown alias is an argument error and nothing is launched.
    pub fn run(&self, task: &str, host: Option<&str>, command: &str) -> Result<OperationResult> {
        let (program, args) = match host {
            None => (process::SHELL, process::local_shell_args(command)),
            Some(alias) => {
                let target = self.hosts.resolve(alias)?;
                (process::REMOTE_EXEC, process::remote_shell_args(&target, command))
            }
        };

        let host = host.unwrap_or_default().to_string();
        let target = OpTarget::Command {
            command: command.to_string(),
        };
        Ok(self.execute(task, OpKind::Run, host, target, program, &args))
    }

    /// Push `src` to `dst`
    pub fn sync(&self, task: &str, src: &str, dst: &str) -> OperationResult {
        self.transfer(task, OpKind::Sync, src, dst)
    }

    /// Pull `src` into `dst`
    pub fn fetch(&self, task: &str, src: &str, dst: &str) -> OperationResult {
        self.transfer(task, OpKind::Fetch, src, dst)
    }

    fn transfer(&self, task: &str, op: OpKind, src: &str, dst: &str) -> OperationResult {
        let src_ep = match Endpoint::resolve(&self.hosts, src) {
            Ok(ep) => ep,
            Err(e) => return OperationResult::failed(op, e.to_string()),
        };
        let dst_ep = match Endpoint::resolve(&self.hosts, dst) {
            Ok(ep) => ep,
            Err(e) => return OperationResult::failed(op, e.to_string()),
        };

        let source = transfer::transfer_source(op, &src_ep);

        if !self.dry_run {
            if let Err(e) = transfer::ensure_local_dest(&dst_ep) {
                return OperationResult::failed(op, transfer::dest_error(&dst_ep, e).to_string());
            }
        }

        let host = dst_ep
            .alias
            .clone()
            .or_else(|| src_ep.alias.clone())
            .unwrap_or_default();
        let target = OpTarget::Transfer {
            src: src.to_string(),
            dst: dst.to_string(),
        };
        let args = process::mirror_args(&source, &dst_ep.resolved);

        let mut result = self.execute(task, op, host, target, process::MIRROR, &args);
        if result.ok {
            result.stderr.clear();
        }
        result
    }

    fn execute(
        &self,
        task: &str,
        op: OpKind,
        host: String,
        target: OpTarget,
        program: &str,
        args: &[String],
    ) -> OperationResult {
        let start = Instant::now();
        self.bus.emit(Event::now(
            task,
            EventKind::OpStart {
                op,
                host: host.clone(),
                target,
            },
        ));

        let result = if self.dry_run {
            log::debug!("dry-run: skipping {} {}", program, args.join(" "));
            OperationResult::skipped(op)
        } else {
            OperationResult::from_output(op, self.launcher.launch(program, args))
        };

        self.bus.emit(Event::now(
            task,
            EventKind::OpEnd {
                op,
                host,
                ok: result.ok,
                code: result.code,
                duration: start.elapsed(),
                stdout_len: result.stdout.len(),
                stderr_len: result.stderr.len(),
            },
        ));

        result
    }

    /// Emit a Message event
    pub fn log(&self, task: &str, level: Level, text: &str, attributes: Vec<(String, String)>) {
        self.bus.emit(Event::now(
            task,
            EventKind::Message {
                level,
                text: text.to_string(),
                attributes,
            },
        ));
    }
}

/// Execution context for one task invocation
#[derive(Debug, Clone)]
pub struct TaskContext {
    task: String,
    ops: OperationRunner,
}

impl TaskContext {
    pub fn new(task: impl Into<String>, ops: OperationRunner) -> Self {
        Self {
            task: task.into(),
            ops,
        }
    }

    /// Name of the running task
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn is_dry_run(&self) -> bool {
        self.ops.is_dry_run()
    }

    /// Run a command in the local shell
    pub fn run(&self, command: &str) -> OperationResult {
        match self.ops.run(&self.task, None, command) {
            Ok(result) => result,
            Err(e) => OperationResult::failed(OpKind::Run, e.to_string()),
        }
    }

    /// Run a command on a configured host
    pub fn run_on(&self, host: &str, command: &str) -> Result<OperationResult> {
        self.ops.run(&self.task, Some(host), command)
    }

    pub fn sync(&self, src: &str, dst: &str) -> OperationResult {
        self.ops.sync(&self.task, src, dst)
    }

    pub fn fetch(&self, src: &str, dst: &str) -> OperationResult {
        self.ops.fetch(&self.task, src, dst)
    }

    pub fn log(&self, level: Level, text: &str, attributes: &[(&str, &str)]) {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.ops.log(&self.task, level, text, attributes);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingLauncher;
    use super::*;
    use crate::config::Host;
    use std::sync::Mutex;

    struct Fixture {
        launcher: Arc<RecordingLauncher>,
        events: Arc<Mutex<Vec<Event>>>,
        ctx: TaskContext,
    }

    fn fixture(launcher: RecordingLauncher, dry_run: bool) -> Fixture {
        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let launcher = Arc::new(launcher);
        let hosts = HostConfig::new()
            .with_host("web", Host::new("10.0.0.5", "deploy"))
            .with_host("box", Host::new("box.local", ""));
        let ops = OperationRunner::new(hosts, bus, launcher.clone(), dry_run);

        Fixture {
            launcher,
            events,
            ctx: TaskContext::new("deploy", ops),
        }
    }

    impl Fixture {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_local_run_uses_shell() {
        let f = fixture(RecordingLauncher::succeeding(), false);
        let result = f.ctx.run("make all");

        assert!(result.ok);
        assert_eq!(
            f.launcher.calls(),
            vec![("sh".to_string(), vec!["-lc".to_string(), "make all".to_string()])]
        );
    }

    #[test]
    fn test_remote_run_resolves_alias_and_quotes() {
        let f = fixture(RecordingLauncher::succeeding(), false);
        f.ctx.run_on("web", "echo 'hi'").unwrap();
        f.ctx.run_on("box", "uptime").unwrap();

        let calls = f.launcher.calls();
        assert_eq!(calls[0].0, "ssh");
        assert_eq!(
            calls[0].1,
            vec!["deploy@10.0.0.5", "--", r"sh -lc 'echo '\''hi'\'''"]
        );
        assert_eq!(calls[1].1[0], "box.local");
    }

    #[test]
    fn test_remote_run_unknown_alias_launches_nothing() {
        let f = fixture(RecordingLauncher::succeeding(), false);
        let err = f.ctx.run_on("nope", "uptime").unwrap_err();

        assert!(matches!(err, WeaveError::Argument(_)));
        assert!(f.launcher.calls().is_empty());
        assert!(f.events().is_empty());
    }

    #[test]
    fn test_run_events_carry_lengths_not_content() {
        let f = fixture(RecordingLauncher::exiting(7, "bad things"), false);
        let result = f.ctx.run_on("web", "false").unwrap();
        assert!(!result.ok);
        assert_eq!(result.code, 7);

        let events = f.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.task == "deploy"));
        match &events[0].kind {
            EventKind::OpStart { op, host, target } => {
                assert_eq!(*op, OpKind::Run);
                assert_eq!(host, "web");
                assert_eq!(
                    *target,
                    OpTarget::Command {
                        command: "false".into()
                    }
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[1].kind {
            EventKind::OpEnd {
                ok,
                code,
                stderr_len,
                stdout_len,
                ..
            } => {
                assert!(!ok);
                assert_eq!(*code, 7);
                assert_eq!(*stderr_len, "bad things".len());
                assert_eq!(*stdout_len, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_sync_local_dir_to_remote_copies_contents() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("dist");
        std::fs::create_dir(&local).unwrap();
        let local = local.to_string_lossy().into_owned();

        let f = fixture(RecordingLauncher::succeeding(), false);
        let result = f.ctx.sync(&local, "web:/srv/app");
        assert!(result.ok);

        let calls = f.launcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "rsync");
        assert_eq!(
            calls[0].1,
            vec![
                "-az".to_string(),
                "--delete".to_string(),
                format!("{}/", local),
                "deploy@10.0.0.5:/srv/app".to_string(),
            ]
        );
        // only the pre-existing dist directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_fetch_creates_local_destination_and_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let dst = format!("{}/logs/app/", dir.path().display());

        let f = fixture(RecordingLauncher::succeeding(), false);
        let result = f.ctx.fetch("web:/var/log/app", &dst);
        assert!(result.ok);
        assert!(dir.path().join("logs/app").is_dir());

        let calls = f.launcher.calls();
        assert_eq!(calls[0].1[2], "deploy@10.0.0.5:/var/log/app");
        assert_eq!(calls[0].1[3], dst);

        match &f.events()[0].kind {
            EventKind::OpStart { op, host, .. } => {
                assert_eq!(*op, OpKind::Fetch);
                assert_eq!(host, "web");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_transfer_unknown_alias_short_circuits() {
        let f = fixture(RecordingLauncher::succeeding(), false);
        let result = f.ctx.sync("./dist", "db:/srv");

        assert!(!result.ok);
        assert_eq!(result.code, 1);
        assert!(result.stderr.contains("unknown host: db"));
        assert!(f.launcher.calls().is_empty());
        assert!(f.events().is_empty());
    }

    #[test]
    fn test_failed_transfer_keeps_stderr() {
        let f = fixture(RecordingLauncher::exiting(23, "partial transfer"), false);
        let result = f.ctx.sync("web:/a", "web:/b");
        assert!(!result.ok);
        assert_eq!(result.code, 23);
        assert_eq!(result.stderr, "partial transfer");

        let err = result.check().unwrap_err();
        assert_eq!(err.to_string(), "sync failed with exit code 23: partial transfer");
    }

    #[test]
    fn test_dry_run_skips_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let dst = format!("{}/never/", dir.path().display());

        let f = fixture(RecordingLauncher::exiting(1, "should not run"), true);
        assert!(f.ctx.run("rm -rf /").ok);
        assert!(f.ctx.run_on("web", "reboot").unwrap().ok);
        assert!(f.ctx.sync("./dist", "web:/srv").ok);
        let fetched = f.ctx.fetch("web:/srv", &dst);
        assert!(fetched.ok);
        assert_eq!(fetched.code, 0);

        assert!(f.launcher.calls().is_empty());
        assert!(!dir.path().join("never").exists());

        let kinds: Vec<bool> = f
            .events()
            .iter()
            .map(|e| matches!(e.kind, EventKind::OpStart { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false, true, false, true, false, true, false]);
    }

    #[test]
    fn test_log_emits_message() {
        let f = fixture(RecordingLauncher::succeeding(), false);
        f.ctx.log(Level::Warn, "disk low", &[("free", "2%")]);

        let events = f.events();
        assert_eq!(
            events[0].kind,
            EventKind::Message {
                level: Level::Warn,
                text: "disk low".into(),
                attributes: vec![("free".into(), "2%".into())],
            }
        );
    }
}
