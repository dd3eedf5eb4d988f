//! Post-install version checks. Failures are warnings only: the current
//! session may not see the new group membership or PATH yet.

use crate::command::{CommandRunner, HostCommand};
use tracing::{info, warn};

/// Commands whose output identifies the installed components.
pub fn version_checks() -> Vec<HostCommand> {
    vec![
        HostCommand::new("docker").arg("--version"),
        HostCommand::new("docker").args(["compose", "version"]),
        HostCommand::new("docker").args(["buildx", "version"]),
        HostCommand::new("containerd").arg("--version"),
    ]
}

/// Run every version check and return how many succeeded.
pub fn report_versions(runner: &dyn CommandRunner) -> usize {
    let mut ok = 0;

    for check in version_checks() {
        match runner.run(&check) {
            Ok(out) if out.success => {
                let version = out.stdout.lines().next().unwrap_or_default().trim();
                info!("{}", version);
                ok += 1;
            }
            Ok(out) => warn!(
                "`{}` failed: {} (log out and back in, then retry)",
                check,
                out.stderr.trim()
            ),
            Err(e) => warn!("`{}` could not run: {}", check, e),
        }
    }

    ok
}
