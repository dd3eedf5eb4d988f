//! External command execution
//!
//! Every interaction with the host (apt, dpkg, curl, gpg, systemctl, usermod)
//! is described as a `HostCommand` and executed through a `CommandRunner`.
//!
//! # Runners
//!
//! - `SystemRunner` spawns real processes in their own process group and
//!   registers them with the global `ChildRegistry`
//! - `DryRun` wraps another runner: read-only probes still execute so the
//!   preview reflects the host, mutating commands are logged and skipped
//!
//! A non-zero exit is not an error at this layer; callers decide whether the
//! failure is fatal (`run_checked`) or anticipated (inspect `CommandOutput`).

use crate::error::{InstallerError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use std::cell::RefCell;
use std::fmt;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    mutating: bool,
}

impl HostCommand {
    /// Start a command for `program`, looked up on PATH at spawn time.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            mutating: false,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for this command only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Mark the command as changing host state (skipped in dry-run mode).
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    /// Program name as passed to `new`.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in the order they will be passed.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables, in insertion order.
    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    /// True if the command changes host state.
    pub fn is_mutating(&self) -> bool {
        self.mutating
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Output of a finished (or skipped) command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    /// True if the command was not executed because of dry-run mode.
    pub dry_run: bool,
}

impl CommandOutput {
    /// Successful exit with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
            dry_run: false,
        }
    }

    /// Non-zero exit with the given stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
            dry_run: false,
        }
    }

    /// Placeholder for a command not run in dry-run mode.
    pub fn skipped() -> Self {
        Self {
            dry_run: true,
            ..Self::success("")
        }
    }

    /// Stdout without surrounding whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Convert a non-zero exit into `InstallerError::Command`.
    pub fn ensure_success(self, command: &HostCommand) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(InstallerError::Command {
                command: command.to_string(),
                code: self.exit_code.unwrap_or(-1),
                stderr: last_lines(&self.stderr, 5),
            })
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

/// Executes host commands.
///
/// `run` returns `Err` only if the command could not be executed at all.
pub trait CommandRunner {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput>;

    /// Run and treat a non-zero exit as fatal.
    fn run_checked(&self, command: &HostCommand) -> Result<CommandOutput> {
        self.run(command)?.ensure_success(command)
    }

    fn is_dry_run(&self) -> bool {
        false
    }

    /// Record an action that was skipped because of dry-run mode.
    fn note_skipped(&self, _action: &str) {}
}

/// Runs commands on the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput> {
        debug!("exec: {}", command);

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .envs(command.get_env().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        let child = cmd.spawn().map_err(|e| InstallerError::Command {
            command: command.to_string(),
            code: 127,
            stderr: e.to_string(),
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let waited = child.wait_with_output();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let output = waited?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            success: output.status.success(),
            dry_run: false,
        };

        debug!(
            "exit {}: {}",
            result.exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
            command.program()
        );

        Ok(result)
    }
}

/// Dry-run wrapper: read-only commands run, mutating ones are only logged.
#[derive(Debug)]
pub struct DryRun<R> {
    inner: R,
    skipped: RefCell<Vec<String>>,
}

impl<R: CommandRunner> DryRun<R> {
    /// Wrap `inner`; mutating commands are no longer passed to it.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            skipped: RefCell::new(Vec::new()),
        }
    }

    /// Actions skipped so far, in order.
    pub fn skipped(&self) -> Vec<String> {
        self.skipped.borrow().clone()
    }

    /// Unwrap the inner runner.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: CommandRunner> CommandRunner for DryRun<R> {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput> {
        if command.is_mutating() {
            self.note_skipped(&command.to_string());
            Ok(CommandOutput::skipped())
        } else {
            self.inner.run(command)
        }
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    fn note_skipped(&self, action: &str) {
        info!("[dry-run] would run: {}", action);
        self.skipped.borrow_mut().push(action.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let cmd = HostCommand::new("sh").args(["-c", "echo hi"]);
        assert_eq!(cmd.to_string(), "sh -c 'echo hi'");
    }

    #[test]
    fn test_system_runner_captures_stdout() {
        let out = SystemRunner
            .run(&HostCommand::new("sh").args(["-c", "echo hello"]))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout_trimmed(), "hello");
        assert_eq!(out.exit_code, Some(0));
    }

    #[test]
    fn test_system_runner_nonzero_exit_is_not_an_error() {
        let cmd = HostCommand::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let out = SystemRunner.run(&cmd).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));

        let err = SystemRunner.run_checked(&cmd).unwrap_err();
        match err {
            InstallerError::Command { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_system_runner_passes_env() {
        let cmd = HostCommand::new("sh")
            .args(["-c", "printf %s \"$DEBIAN_FRONTEND\""])
            .env("DEBIAN_FRONTEND", "noninteractive");
        let out = SystemRunner.run(&cmd).unwrap();
        assert_eq!(out.stdout, "noninteractive");
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let err = SystemRunner
            .run(&HostCommand::new("definitely-not-a-real-binary-12345"))
            .unwrap_err();
        assert!(matches!(err, InstallerError::Command { code: 127, .. }));
    }

    #[test]
    fn test_dry_run_skips_mutating_commands() {
        let runner = DryRun::new(SystemRunner);

        let probe = runner
            .run(&HostCommand::new("sh").args(["-c", "echo probe"]))
            .unwrap();
        assert_eq!(probe.stdout_trimmed(), "probe");

        let skipped = runner
            .run(&HostCommand::new("sh").args(["-c", "exit 1"]).mutating())
            .unwrap();
        assert!(skipped.success);
        assert!(skipped.dry_run);
        assert_eq!(runner.skipped(), vec!["sh -c 'exit 1'".to_string()]);
    }

    #[test]
    fn test_last_lines_keeps_tail() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b | c");
        assert_eq!(last_lines("", 2), "");
    }
}
