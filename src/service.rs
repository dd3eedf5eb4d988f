//! Docker service activation and group access
//!
//! Enabling the service is fatal on failure. Group creation and membership
//! changes are not: the package normally creates the group, and a failed
//! `usermod` leaves a working daemon that only root can reach.

use crate::command::{CommandRunner, HostCommand};
use crate::error::Result;
use crate::types::TargetUser;
use strum::Display;
use tracing::{info, warn};

/// `systemctl enable --now <service>`
pub fn enable_service(runner: &dyn CommandRunner, service: &str) -> Result<()> {
    info!("Enabling and starting {}", service);
    runner.run_checked(
        &HostCommand::new("systemctl")
            .args(["enable", "--now"])
            .arg(service)
            .mutating(),
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GroupStatus {
    #[strum(serialize = "already exists")]
    Existing,
    #[strum(serialize = "created")]
    Created,
    /// groupadd failed; logged as a warning
    #[strum(serialize = "missing")]
    Missing,
}

pub fn group_exists(runner: &dyn CommandRunner, group: &str) -> Result<bool> {
    Ok(runner
        .run(&HostCommand::new("getent").arg("group").arg(group))?
        .success)
}

/// Make sure `group` exists, creating it if needed. Never fatal.
pub fn ensure_group(runner: &dyn CommandRunner, group: &str) -> Result<GroupStatus> {
    if group_exists(runner, group)? {
        info!("Group '{}' already exists", group);
        return Ok(GroupStatus::Existing);
    }

    match runner.run(&HostCommand::new("groupadd").arg(group).mutating()) {
        Ok(out) if out.success => {
            info!("Created group '{}'", group);
            Ok(GroupStatus::Created)
        }
        Ok(out) => {
            warn!("Could not create group '{}': {}", group, out.stderr.trim());
            Ok(GroupStatus::Missing)
        }
        Err(e) => {
            warn!("Could not create group '{}': {}", group, e);
            Ok(GroupStatus::Missing)
        }
    }
}

/// Group names from `id -nG` output.
pub fn parse_groups(id_output: &str) -> Vec<String> {
    id_output.split_whitespace().map(str::to_string).collect()
}

pub fn is_member(runner: &dyn CommandRunner, user: &TargetUser, group: &str) -> Result<bool> {
    let out = match runner.run(&HostCommand::new("id").arg("-nG").arg(user.as_str())) {
        Ok(out) if out.success => out,
        Ok(out) => {
            warn!("Could not read groups of '{}': {}", user, out.stderr.trim());
            return Ok(false);
        }
        Err(e) => {
            warn!("Could not read groups of '{}': {}", user, e);
            return Ok(false);
        }
    };
    Ok(parse_groups(&out.stdout).iter().any(|g| g == group))
}

/// Result of the user access step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Target user is root; nothing to do
    Superuser,
    AlreadyMember,
    Added,
    /// usermod failed; logged as a warning
    Failed(String),
}

/// Add `user` to `group` unless it is root or already a member. Never fatal.
pub fn grant_access(
    runner: &dyn CommandRunner,
    user: &TargetUser,
    group: &str,
) -> Result<AccessOutcome> {
    if user.is_superuser() {
        info!("Target user is root; skipping group membership");
        return Ok(AccessOutcome::Superuser);
    }

    if is_member(runner, user, group)? {
        info!("User '{}' is already in group '{}'", user, group);
        return Ok(AccessOutcome::AlreadyMember);
    }

    let usermod = HostCommand::new("usermod")
        .args(["-aG", group])
        .arg(user.as_str())
        .mutating();

    let reason = match runner.run(&usermod) {
        Ok(out) if out.success => {
            info!("Added '{}' to group '{}'", user, group);
            return Ok(AccessOutcome::Added);
        }
        Ok(out) => out.stderr.trim().to_string(),
        Err(e) => e.to_string(),
    };

    warn!("Could not add '{}' to group '{}': {}", user, group, reason);
    Ok(AccessOutcome::Failed(reason))
}
