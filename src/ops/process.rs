//! Process launching for shell, remote-exec and mirror operations

use std::process::Command;

/// Local POSIX shell
pub const SHELL: &str = "sh";
/// Remote-exec transport
pub const REMOTE_EXEC: &str = "ssh";
/// Delta-mirroring transfer tool
pub const MIRROR: &str = "rsync";

/// Captured result of one process invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Result for a process that could not be launched at all
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: 1,
            stdout: String::new(),
            stderr: message.into(),
        }
    }
}

/// Starts external programs and waits for them
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &str, args: &[String]) -> ProcessOutput;
}

/// Launcher backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, program: &str, args: &[String]) -> ProcessOutput {
        log::debug!("executing: {} {}", program, args.join(" "));

        match Command::new(program).args(args).output() {
            Ok(output) => ProcessOutput {
                success: output.status.success(),
                // killed by a signal: no usable code
                code: output.status.code().unwrap_or(1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => {
                log::warn!("failed to launch {}: {}", program, e);
                ProcessOutput::launch_failure(format!("failed to launch {}: {}", program, e))
            }
        }
    }
}

/// Quote for a POSIX shell; embedded single quotes become `'\''`
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// argv for running `command` in the local shell
pub fn local_shell_args(command: &str) -> Vec<String> {
    vec!["-lc".to_string(), command.to_string()]
}

/// argv for running `command` through a login shell on `target`
pub fn remote_shell_args(target: &str, command: &str) -> Vec<String> {
    vec![
        target.to_string(),
        "--".to_string(),
        format!("{} -lc {}", SHELL, shell_quote(command)),
    ]
}

/// argv for a mirroring transfer from `src` to `dst`
pub fn mirror_args(src: &str, dst: &str) -> Vec<String> {
    vec![
        "-az".to_string(),
        "--delete".to_string(),
        src.to_string(),
        dst.to_string(),
    ]
}
