//! Host environment probing
//!
//! Determines the facts the rest of the installer depends on: the dpkg
//! architecture, the release codename from `/etc/os-release`, and the
//! account that should receive Docker access.
//!
//! Architecture detection never fails; it degrades to `unknown`. A host that
//! is not Debian-family is rejected.

use crate::command::{CommandRunner, HostCommand};
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::types::{Architecture, Codename, TargetUser};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use tracing::{info, warn};

/// Parsed `/etc/os-release` (freedesktop key=value format).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    pub fn pretty_name(&self) -> &str {
        self.get("PRETTY_NAME")
            .or_else(|| self.get("NAME"))
            .unwrap_or("unknown distribution")
    }

    /// `VERSION_CODENAME`, falling back to `UBUNTU_CODENAME`.
    pub fn codename(&self) -> Option<Codename> {
        self.get("VERSION_CODENAME")
            .and_then(Codename::new)
            .or_else(|| self.get("UBUNTU_CODENAME").and_then(Codename::new))
    }

    /// True if `ID` or any word of `ID_LIKE` is debian or ubuntu.
    pub fn is_debian_family(&self) -> bool {
        let like = self.get("ID_LIKE").unwrap_or_default();
        self.id()
            .into_iter()
            .chain(like.split_whitespace())
            .any(|id| matches!(id, "debian" | "ubuntu"))
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Facts about the host gathered before any change is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub architecture: Architecture,
    /// Codename reported by the host; may be absent on minimal images.
    pub codename: Option<Codename>,
    pub distribution: String,
    pub target_user: TargetUser,
}

impl HostEnvironment {
    /// Probe the host.
    ///
    /// Fails only if the host is not Debian-family.
    pub fn detect(
        runner: &dyn CommandRunner,
        config: &InstallerConfig,
        target_user: TargetUser,
    ) -> Result<Self> {
        let os_release = read_os_release(config)?;

        if !os_release.is_debian_family() && !config.debian_version_path.exists() {
            return Err(InstallerError::unsupported(format!(
                "{} is not a Debian-family distribution",
                os_release.pretty_name()
            )));
        }

        let architecture = detect_architecture(runner);
        let codename = os_release.codename();
        if codename.is_none() {
            warn!(
                "No release codename in {}; relying on fallback codenames",
                config.os_release_path.display()
            );
        }

        let env = Self {
            architecture,
            codename,
            distribution: os_release.pretty_name().to_string(),
            target_user,
        };

        info!("Detected {}", env);
        Ok(env)
    }
}

impl fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (arch={}, codename={}, user={})",
            self.distribution,
            self.architecture,
            self.codename.as_ref().map_or("none", Codename::as_str),
            self.target_user
        )
    }
}

fn read_os_release(config: &InstallerConfig) -> Result<OsRelease> {
    match fs::read_to_string(&config.os_release_path) {
        Ok(content) => Ok(OsRelease::parse(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} not found", config.os_release_path.display());
            Ok(OsRelease::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// `dpkg --print-architecture`, or `unknown` if that fails for any reason.
pub fn detect_architecture(runner: &dyn CommandRunner) -> Architecture {
    match runner.run(&HostCommand::new("dpkg").arg("--print-architecture")) {
        Ok(out) if out.success => {
            let arch = Architecture::new(out.stdout_trimmed());
            if !arch.is_known() {
                warn!("dpkg reported an empty architecture; using 'unknown'");
            }
            arch
        }
        Ok(out) => {
            warn!(
                "dpkg --print-architecture failed ({}); using 'unknown'",
                out.stderr.trim()
            );
            Architecture::unknown()
        }
        Err(e) => {
            warn!("Could not run dpkg to detect architecture ({}); using 'unknown'", e);
            Architecture::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAMMY: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=jammy
"#;

    #[test]
    fn test_parse_ubuntu_os_release() {
        let release = OsRelease::parse(JAMMY);
        assert_eq!(release.id(), Some("ubuntu"));
        assert_eq!(release.pretty_name(), "Ubuntu 22.04.4 LTS");
        assert_eq!(release.codename().unwrap().as_str(), "jammy");
        assert!(release.is_debian_family());
    }

    #[test]
    fn test_codename_falls_back_to_ubuntu_codename() {
        let release = OsRelease::parse("ID=linuxmint\nID_LIKE=\"ubuntu debian\"\nVERSION_CODENAME=\nUBUNTU_CODENAME=noble\n");
        assert_eq!(release.codename().unwrap().as_str(), "noble");
        assert!(release.is_debian_family());
    }

    #[test]
    fn test_non_debian_family() {
        let release = OsRelease::parse("ID=fedora\nVERSION_ID=40\n");
        assert!(!release.is_debian_family());
        assert!(release.codename().is_none());
    }

    #[test]
    fn test_comments_and_single_quotes() {
        let release = OsRelease::parse("# generated\nNAME='Debian GNU/Linux'\nID=debian\n");
        assert_eq!(release.pretty_name(), "Debian GNU/Linux");
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote("plain"), "plain");
    }
}
