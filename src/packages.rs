//! apt/dpkg operations
//!
//! Every apt-get invocation runs non-interactively (`DEBIAN_FRONTEND`,
//! `NEEDRESTART_MODE`) so unattended runs never stop at a prompt.

use crate::command::{CommandRunner, HostCommand};
use crate::error::Result;
use strum::Display;
use tracing::{debug, info};

/// Environment applied to every apt-get call.
pub const NONINTERACTIVE_ENV: &[(&str, &str)] =
    &[("DEBIAN_FRONTEND", "noninteractive"), ("NEEDRESTART_MODE", "a")];

/// Options that keep dpkg from prompting about changed conffiles and make apt
/// take phased updates instead of silently holding them back.
pub const INSTALL_OPTIONS: &[&str] = &[
    "-o",
    "Dpkg::Options::=--force-confdef",
    "-o",
    "Dpkg::Options::=--force-confold",
    "-o",
    "APT::Get::Always-Include-Phased-Updates=true",
];

fn apt_get() -> HostCommand {
    NONINTERACTIVE_ENV
        .iter()
        .fold(HostCommand::new("apt-get"), |cmd, (k, v)| cmd.env(*k, *v))
        .mutating()
}

/// Installation state of a single package as reported by dpkg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PackageState {
    #[strum(serialize = "installed")]
    Installed,
    /// Removed but configuration files remain; nothing to remove.
    #[strum(serialize = "config-files only")]
    ConfigFilesOnly,
    #[strum(serialize = "not installed")]
    NotInstalled,
}

impl PackageState {
    /// Interpret the `${Status}` field (`want flag status`).
    pub fn from_dpkg_status(status: &str) -> Self {
        match status.split_whitespace().last() {
            Some("installed") | Some("half-configured") | Some("unpacked")
            | Some("half-installed") | Some("triggers-awaited") | Some("triggers-pending") => {
                Self::Installed
            }
            Some("config-files") => Self::ConfigFilesOnly,
            _ => Self::NotInstalled,
        }
    }

    pub fn needs_removal(self) -> bool {
        matches!(self, Self::Installed)
    }
}

/// What the conflicting-package step will do for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RemovalAction {
    #[strum(serialize = "remove")]
    Remove,
    #[strum(serialize = "skip")]
    Skip,
}

/// Query dpkg for a package. An unknown package is `NotInstalled`.
pub fn package_state(runner: &dyn CommandRunner, package: &str) -> Result<PackageState> {
    let out = runner.run(
        &HostCommand::new("dpkg-query")
            .args(["-W", "--showformat=${Status}"])
            .arg(package),
    )?;

    let state = if out.success {
        PackageState::from_dpkg_status(out.stdout_trimmed())
    } else {
        PackageState::NotInstalled
    };
    debug!("{}: {}", package, state);
    Ok(state)
}

/// Build the {package -> action} table for the conflicting package list.
pub fn plan_conflict_removal(
    runner: &dyn CommandRunner,
    packages: &[String],
) -> Result<Vec<(String, RemovalAction)>> {
    packages
        .iter()
        .map(|pkg| {
            let action = if package_state(runner, pkg)?.needs_removal() {
                RemovalAction::Remove
            } else {
                RemovalAction::Skip
            };
            Ok((pkg.clone(), action))
        })
        .collect()
}

/// Remove every conflicting package that is installed. Returns the removed names.
pub fn remove_conflicting(runner: &dyn CommandRunner, packages: &[String]) -> Result<Vec<String>> {
    let mut removed = Vec::new();

    for (pkg, action) in plan_conflict_removal(runner, packages)? {
        match action {
            RemovalAction::Remove => {
                info!("Removing conflicting package {}", pkg);
                runner.run_checked(&apt_get().args(["remove", "-y"]).arg(pkg.as_str()))?;
                removed.push(pkg);
            }
            RemovalAction::Skip => debug!("{} not installed, skipping", pkg),
        }
    }

    if removed.is_empty() {
        info!("No conflicting packages installed");
    }
    Ok(removed)
}

/// Finish any interrupted dpkg run so later apt calls do not stop on it.
pub fn configure_noninteractive(runner: &dyn CommandRunner) -> Result<()> {
    let env: Vec<String> = NONINTERACTIVE_ENV
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    info!("Package manager runs non-interactively ({})", env.join(" "));

    let dpkg = NONINTERACTIVE_ENV
        .iter()
        .fold(HostCommand::new("dpkg"), |cmd, (k, v)| cmd.env(*k, *v))
        .args(["--configure", "-a"])
        .mutating();
    runner.run_checked(&dpkg)?;
    Ok(())
}

/// `apt-get update`
pub fn update_index(runner: &dyn CommandRunner) -> Result<()> {
    info!("Refreshing package index");
    runner.run_checked(&apt_get().arg("update"))?;
    Ok(())
}

/// Refresh the index and install the tools the installer itself needs.
pub fn install_prerequisites(runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
    update_index(runner)?;
    info!("Installing prerequisites: {}", packages.join(" "));
    runner.run_checked(&apt_get().args(["install", "-y"]).args(packages.iter().cloned()))?;
    Ok(())
}

/// Refresh the index (now including the Docker repository) and install Docker.
pub fn install_docker_packages(runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
    update_index(runner)?;
    info!("Installing {}", packages.join(" "));
    runner.run_checked(
        &apt_get()
            .args(["install", "-y"])
            .args(INSTALL_OPTIONS.iter().copied())
            .args(packages.iter().cloned()),
    )?;
    Ok(())
}
