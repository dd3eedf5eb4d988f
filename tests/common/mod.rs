//! Simulated Debian host for integration tests.
//!
//! `FakeHost` answers the commands the installer issues (dpkg, apt-get, curl,
//! gpg, systemctl, getent, id, usermod, docker) from in-memory state and
//! records every command it receives.

#![allow(dead_code)]

use dockstrap::command::{CommandOutput, CommandRunner, HostCommand};
use dockstrap::config::InstallerConfig;
use dockstrap::error::Result;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const JAMMY_OS_RELEASE: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=jammy
"#;

pub struct FakeHost {
    pub architecture: Option<String>,
    pub installed: RefCell<HashSet<String>>,
    pub reachable: Vec<String>,
    pub groups: RefCell<HashSet<String>>,
    pub memberships: RefCell<HashMap<String, Vec<String>>>,
    /// Programs that exit non-zero (e.g. "usermod", "docker")
    pub failing: HashSet<String>,
    pub log: RefCell<Vec<HostCommand>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            architecture: Some("amd64".to_string()),
            installed: RefCell::new(HashSet::new()),
            reachable: vec!["jammy".to_string()],
            groups: RefCell::new(HashSet::new()),
            memberships: RefCell::new(HashMap::new()),
            failing: HashSet::new(),
            log: RefCell::new(Vec::new()),
        }
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

impl FakeHost {
    pub fn with_installed(self, packages: &[&str]) -> Self {
        self.installed
            .borrow_mut()
            .extend(packages.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_reachable(mut self, codenames: &[&str]) -> Self {
        self.reachable = codenames.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_member(self, user: &str, group: &str) -> Self {
        self.groups.borrow_mut().insert(group.to_string());
        self.memberships
            .borrow_mut()
            .entry(user.to_string())
            .or_default()
            .push(group.to_string());
        self
    }

    pub fn with_failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Every recorded command rendered as a string.
    pub fn commands(&self) -> Vec<String> {
        self.log.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands().iter().any(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn respond(&self, cmd: &HostCommand) -> CommandOutput {
        let args = cmd.get_args();
        let first = args.first().map(String::as_str).unwrap_or_default();

        if self.failing.contains(cmd.program()) {
            return CommandOutput::failure(1, format!("{}: simulated failure", cmd.program()));
        }

        match cmd.program() {
            "sh" => CommandOutput::success("/usr/bin/tool\n"),
            "dpkg" if first == "--print-architecture" => match &self.architecture {
                Some(arch) => CommandOutput::success(format!("{}\n", arch)),
                None => CommandOutput::failure(2, "dpkg: not found"),
            },
            "dpkg" => CommandOutput::success(""),
            "dpkg-query" => {
                let pkg = args.last().cloned().unwrap_or_default();
                if self.installed.borrow().contains(&pkg) {
                    CommandOutput::success("install ok installed")
                } else {
                    CommandOutput::failure(1, format!("dpkg-query: no packages found matching {}", pkg))
                }
            }
            "apt-get" => {
                match first {
                    "remove" => {
                        for pkg in &args[2..] {
                            self.installed.borrow_mut().remove(pkg);
                        }
                    }
                    "install" => {
                        for pkg in args[2..].iter().filter(|a| !a.starts_with('-') && !a.contains("::")) {
                            self.installed.borrow_mut().insert(pkg.clone());
                        }
                    }
                    _ => {}
                }
                CommandOutput::success("")
            }
            "curl" if args.iter().any(|a| a == "-I") => {
                let url = args.last().cloned().unwrap_or_default();
                if self.reachable.iter().any(|c| url.contains(&format!("/dists/{}/", c))) {
                    CommandOutput::success("")
                } else {
                    CommandOutput::failure(22, "curl: (22) The requested URL returned error: 404")
                }
            }
            "curl" => {
                if let Some(out) = value_after(args, "-o") {
                    let _ = std::fs::write(out, "-----BEGIN PGP PUBLIC KEY BLOCK-----\n");
                }
                CommandOutput::success("")
            }
            "gpg" => {
                if let Some(out) = value_after(args, "-o") {
                    let _ = std::fs::write(out, [0x99u8, 0x02, 0x0d]);
                }
                CommandOutput::success("")
            }
            "getent" => {
                let group = args.last().cloned().unwrap_or_default();
                if self.groups.borrow().contains(&group) {
                    CommandOutput::success(format!("{}:x:999:\n", group))
                } else {
                    CommandOutput::failure(2, "")
                }
            }
            "groupadd" => {
                self.groups.borrow_mut().insert(args[0].clone());
                CommandOutput::success("")
            }
            "id" => {
                let user = args.last().cloned().unwrap_or_default();
                let groups = self
                    .memberships
                    .borrow()
                    .get(&user)
                    .cloned()
                    .unwrap_or_default();
                CommandOutput::success(format!("{} {}\n", user, groups.join(" ")))
            }
            "usermod" => {
                let group = args[1].clone();
                let user = args[2].clone();
                self.memberships.borrow_mut().entry(user).or_default().push(group);
                CommandOutput::success("")
            }
            "docker" => CommandOutput::success("Docker version 27.3.1, build ce12230\n"),
            "containerd" => CommandOutput::success("containerd containerd.io 1.7.22\n"),
            _ => CommandOutput::success(""),
        }
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput> {
        self.log.borrow_mut().push(command.clone());
        Ok(self.respond(command))
    }
}

/// Config whose filesystem paths all live under `root`, with a jammy os-release.
pub fn test_config(root: &Path) -> InstallerConfig {
    let os_release = root.join("os-release");
    std::fs::write(&os_release, JAMMY_OS_RELEASE).expect("write os-release");

    InstallerConfig {
        keyring_dir: root.join("keyrings"),
        keyring_path: root.join("keyrings").join("docker.gpg"),
        source_list_path: root.join("sources.list.d").join("docker.list"),
        os_release_path: os_release,
        debian_version_path: root.join("debian_version"),
        ..InstallerConfig::default()
    }
}
