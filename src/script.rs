//! Scripted task bodies - step lists declared in a Weavefile
//!
//! ```yaml
//! steps:
//!   - run: make
//!   - run: { host: web, cmd: "systemctl restart app", ignore_failure: true }
//!   - sync: { src: ./dist, dst: "web:/srv/app" }
//!   - fetch: { src: "web:/var/log/app", dst: ./logs/ }
//!   - log: { level: warn, msg: deployed, attrs: { version: "1.2" } }
//! ```
//!
//! A failing operation stops the body unless the step sets `ignore_failure`.

use crate::core::Runnable;
use crate::events::Level;
use crate::ops::{OperationResult, TaskContext};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One step of a scripted body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Run(RunStep),
    Sync(TransferStep),
    Fetch(TransferStep),
    Log(LogStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RunStep {
    Command(String),
    Detailed(CommandStep),
}

/// `run` in map form. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandStep {
    pub cmd: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub ignore_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferStep {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub ignore_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogStep {
    #[serde(default)]
    pub level: Option<String>,
    pub msg: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

/// Ordered list of steps run against a task context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

/// Deserialize a step list written in the `- run: ...` map form.
///
/// serde_yaml only reads externally tagged enums from `!tag` syntax, so the
/// list goes through its singleton-map adapter.
pub fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_yaml::with::singleton_map_recursive::deserialize(deserializer)
}

impl Runnable for Script {
    fn call(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            run_step(ctx, step).with_context(|| format!("step {}", index + 1))?;
        }
        Ok(())
    }
}

fn run_step(ctx: &TaskContext, step: &Step) -> anyhow::Result<()> {
    match step {
        Step::Run(RunStep::Command(cmd)) => finish(ctx.run(cmd), false),
        Step::Run(RunStep::Detailed(step)) => {
            let result = match &step.host {
                Some(host) => ctx.run_on(host, &step.cmd)?,
                None => ctx.run(&step.cmd),
            };
            finish(result, step.ignore_failure)
        }
        Step::Sync(t) => finish(ctx.sync(&t.src, &t.dst), t.ignore_failure),
        Step::Fetch(t) => finish(ctx.fetch(&t.src, &t.dst), t.ignore_failure),
        Step::Log(log) => {
            let level = log
                .level
                .as_deref()
                .map(Level::parse_lenient)
                .unwrap_or_default();
            let attrs: Vec<(&str, &str)> = log
                .attrs
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            ctx.log(level, &log.msg, &attrs);
            Ok(())
        }
    }
}

fn finish(result: OperationResult, ignore_failure: bool) -> anyhow::Result<()> {
    if ignore_failure {
        if !result.ok {
            log::debug!("ignoring failed {} (exit {})", result.op, result.code);
        }
        return Ok(());
    }
    result.check()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Host, HostConfig};
    use crate::events::{EventBus, EventKind};
    use crate::ops::testing::RecordingLauncher;
    use crate::ops::OperationRunner;
    use std::sync::{Arc, Mutex};

    fn try_parse(yaml: &str) -> Result<Vec<Step>, serde_yaml::Error> {
        deserialize_steps(serde_yaml::Deserializer::from_str(yaml))
    }

    fn parse(yaml: &str) -> Vec<Step> {
        try_parse(yaml).unwrap()
    }

    fn context(launcher: Arc<RecordingLauncher>, bus: EventBus) -> TaskContext {
        let hosts = HostConfig::new().with_host("web", Host::new("10.0.0.5", "deploy"));
        TaskContext::new("deploy", OperationRunner::new(hosts, bus, launcher, false))
    }

    #[test]
    fn test_parse_steps() {
        let steps = parse(
            r#"
- run: make
- run: { host: web, cmd: uptime, ignore_failure: true }
- sync: { src: ./dist, dst: "web:/srv" }
- fetch: { src: "web:/log", dst: ./logs/ }
- log: { level: warn, msg: done, attrs: { k: v } }
"#,
        );
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0], Step::Run(RunStep::Command("make".into())));
        assert!(matches!(
            &steps[1],
            Step::Run(RunStep::Detailed(CommandStep { host: Some(h), ignore_failure: true, .. })) if h == "web"
        ));
        assert!(matches!(&steps[4], Step::Log(l) if l.attrs["k"] == "v"));
    }

    #[test]
    fn test_rejects_unknown_step() {
        assert!(try_parse("- shell: ls").is_err());
        assert!(try_parse("- sync: { src: a, dst: b, delete: false }").is_err());
    }

    #[test]
    fn test_rejects_mistyped_run_key() {
        let err = try_parse("- run: { cmd: \"systemctl restart app\", hots: web }\n");
        assert!(err.is_err());
        assert!(try_parse("- run: { host: web }\n").is_err());
    }

    #[test]
    fn test_failure_stops_script() {
        let launcher = Arc::new(RecordingLauncher::exiting(2, "nope"));
        let ctx = context(launcher.clone(), EventBus::new());
        let script = Script::new(parse("- run: first\n- run: second\n"));

        let err = script.call(&ctx).unwrap_err();
        assert!(format!("{:#}", err).contains("step 1"));
        assert!(format!("{:#}", err).contains("exit code 2"));
        assert_eq!(launcher.calls().len(), 1);
    }

    #[test]
    fn test_ignore_failure_continues() {
        let launcher = Arc::new(RecordingLauncher::exiting(2, "nope"));
        let ctx = context(launcher.clone(), EventBus::new());
        let script = Script::new(parse(
            "- run: { cmd: first, ignore_failure: true }\n- sync: { src: 'web:/a', dst: 'web:/b', ignore_failure: true }\n",
        ));

        script.call(&ctx).unwrap();
        assert_eq!(launcher.calls().len(), 2);
    }

    #[test]
    fn test_unknown_host_fails_step() {
        let launcher = Arc::new(RecordingLauncher::succeeding());
        let ctx = context(launcher.clone(), EventBus::new());
        let script = Script::new(parse("- run: { host: db, cmd: uptime }\n"));

        let err = script.call(&ctx).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown host: db"));
        assert!(launcher.calls().is_empty());
    }

    #[test]
    fn test_log_step_defaults_to_info() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |e| sink.lock().unwrap().push(e.kind.clone()));

        let ctx = context(Arc::new(RecordingLauncher::succeeding()), bus);
        Script::new(parse("- log: { msg: hello }\n- log: { level: bogus, msg: again }\n"))
            .call(&ctx)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen
            .iter()
            .all(|k| matches!(k, EventKind::Message { level: Level::Info, .. })));
        assert_eq!(seen.len(), 2);
    }
}
