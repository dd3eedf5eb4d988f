//! Child process lifecycle
//!
//! apt, dpkg and curl run as children of the installer. If the installer is
//! interrupted, those children must not keep modifying the host on their own.
//!
//! - Every child is spawned in its own process group with a parent-death signal
//! - Running child PIDs are tracked in a global registry
//! - SIGINT/SIGTERM/SIGHUP terminate every tracked group (SIGTERM, then SIGKILL)
//!   and exit with `128 + signal`

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Register a newly spawned child process
    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!("Registered child process PID {}", pid);
    }

    /// Unregister a child process (called when it exits normally)
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!("Unregistered child process PID {}", pid);
    }

    /// Number of currently tracked processes
    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked process groups.
    ///
    /// Sends SIGTERM, waits up to `grace_period`, then SIGKILLs survivors.
    /// Only the first call does anything.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        tracing::warn!("Stopping {} running command(s)...", self.pids.len());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            signal_group_or_pid(pid, Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                tracing::warn!("Process group {} ignored SIGTERM, sending SIGKILL", pid);
                signal_group_or_pid(pid, Signal::SIGKILL);
            }
        }

        self.pids.clear();
    }
}

/// Signal the whole process group, falling back to the single PID.
fn signal_group_or_pid(pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if signal::kill(Pid::from_raw(-raw), sig).is_err() {
        if let Err(e) = signal::kill(Pid::from_raw(raw), sig) {
            tracing::debug!("Failed to send {} to PID {}: {}", sig, pid, e);
        }
    }
}

/// A process counts as alive unless it is gone or a zombie.
fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if signal::kill(Pid::from_raw(raw), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state letter
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        if let Some(state) = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
        {
            return !matches!(state, "Z" | "X");
        }
    }

    true
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP. Call once at startup.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "signal",
            };
            tracing::error!("Received {}, aborting installation (no rollback is performed)", name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group that dies with us
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: only async-signal-safe calls (setpgid, prctl) run between fork and exec
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();

        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_process_group() {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 60"])
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sleep");

        let mut registry = ChildRegistry::default();
        registry.register(child.id());

        registry.terminate_all(Duration::from_millis(500));

        let status = child.wait().expect("wait failed");
        assert!(!status.success());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(999_999);

        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);

        registry.register(999_998);
        registry.terminate_all(Duration::from_millis(10));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(999_999));
    }
}
