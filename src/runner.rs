//! Process-spawning capability
//!
//! Device discovery, device pushes and the gsettings backend all talk to
//! external command-line tools. They do it through [`CommandRunner`] so the
//! mechanism is chosen once at construction: [`ShellRunner`] runs real
//! processes, [`DryRunRunner`] only records and logs what would have run.

use std::process::{Command, Stdio};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human-readable reason for a failed run
    pub fn failure_reason(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Runs an external program synchronously and captures its output.
///
/// Implementations block the calling thread for the duration of the process.
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;

    /// Whether commands are only recorded, never executed.
    ///
    /// Long-running helpers that cannot go through [`CommandRunner::run`]
    /// must not be started when this is `true`.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands with `std::process::Command` (no shell involved)
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SyncError::Configuration("empty command line".to_string()))?;

        debug!("Running: {}", argv.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SyncError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Records commands instead of running them.
///
/// Canned responses are matched by argv prefix, first match wins; anything
/// unmatched succeeds with empty output.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    responses: Mutex<Vec<(Vec<String>, CommandOutput)>>,
    history: Mutex<Vec<Vec<String>>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn with_response<S: AsRef<str>>(self, prefix: &[S], output: CommandOutput) -> Self {
        let prefix = prefix.iter().map(|s| s.as_ref().to_string()).collect();
        self.responses.lock().push((prefix, output));
        self
    }

    /// Every command run so far, oldest first
    pub fn history(&self) -> Vec<Vec<String>> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        if argv.is_empty() {
            return Err(SyncError::Configuration("empty command line".to_string()));
        }

        info!("[dry-run] {}", argv.join(" "));
        self.history.lock().push(argv.to_vec());

        let responses = self.responses.lock();
        let output = responses
            .iter()
            .find(|(prefix, _)| argv.starts_with(prefix))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Split a command template and substitute `{placeholder}` arguments
pub fn expand_template(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}
