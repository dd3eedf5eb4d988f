//! Pre-flight sanity checks
//!
//! Verifies before anything is changed:
//! - Running with root privileges (EUID 0), unless in dry-run mode
//! - apt/dpkg tooling and systemctl are present
//!
//! Failures are reported with the remedy and abort the run.

use crate::command::{CommandRunner, HostCommand};
use crate::error::{InstallerError, Result};

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// Turn a failed check into a single descriptive error.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !self.is_root {
            problems.push("root privileges required (run with sudo)".to_string());
        }
        if !self.missing_binaries.is_empty() {
            let packages: Vec<&str> = self
                .missing_binaries
                .iter()
                .map(|b| package_for_binary(b))
                .collect();
            problems.push(format!(
                "missing required commands: {} (provided by: {})",
                self.missing_binaries.join(", "),
                packages.join(" ")
            ));
        }

        Err(InstallerError::unsupported(problems.join("; ")))
    }
}

/// Required runtime binaries; curl and gpg are installed as prerequisites.
const REQUIRED_BINARIES: &[&str] = &[
    "apt-get",
    "dpkg",
    "dpkg-query",
    "systemctl",
    "getent",
    "groupadd",
    "usermod",
    "id",
];

fn binary_exists(runner: &dyn CommandRunner, name: &str) -> bool {
    runner
        .run(&HostCommand::new("sh").args(["-c", "command -v \"$1\"", "sh", name]))
        .map(|out| out.success)
        .unwrap_or(false)
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Map binary names to the Debian package providing them
fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "apt-get" => "apt",
        "dpkg" | "dpkg-query" => "dpkg",
        "systemctl" => "systemd",
        "getent" => "libc-bin",
        "groupadd" | "usermod" => "passwd",
        "id" => "coreutils",
        _ => "unknown",
    }
}

/// Skip the root check (for development/testing).
/// Set DOCKSTRAP_SKIP_ROOT_CHECK=1 to skip.
pub fn should_skip_root_check() -> bool {
    std::env::var("DOCKSTRAP_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn verify_environment(runner: &dyn CommandRunner, skip_root: bool) -> SanityCheckResult {
    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|b| !binary_exists(runner, b))
        .map(|b| (*b).to_string())
        .collect();

    let is_root = if skip_root || should_skip_root_check() {
        tracing::debug!("Root check skipped");
        true
    } else {
        is_running_as_root()
    };

    SanityCheckResult {
        missing_binaries,
        is_root,
    }
}

/// Run all pre-flight checks. Dry runs do not require root.
pub fn run_preflight_checks_with_options(runner: &dyn CommandRunner, skip_root: bool) -> Result<()> {
    tracing::debug!("Running pre-flight sanity checks (skip_root={})...", skip_root);
    verify_environment(runner, skip_root || runner.is_dry_run()).into_result()?;
    tracing::info!("Pre-flight checks passed");
    Ok(())
}
