//! Installer configuration
//!
//! Every value the installer needs (repository location, package lists,
//! file paths, probe limits) lives in `InstallerConfig`. The compiled-in
//! defaults target Docker's Ubuntu repository; a JSON file may override
//! any subset of fields.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InstallerError, Result};

/// Installation configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    // Repository
    pub repository_url: String,
    pub key_url: String,
    pub channel: String,
    pub fallback_codenames: Vec<String>,

    // Trust material and apt sources
    pub keyring_dir: PathBuf,
    pub keyring_path: PathBuf,
    pub source_list_path: PathBuf,

    // Host metadata
    pub os_release_path: PathBuf,
    pub debian_version_path: PathBuf,

    // Packages
    pub prerequisite_packages: Vec<String>,
    pub conflicting_packages: Vec<String>,
    pub docker_packages: Vec<String>,

    // Service and access
    pub service_name: String,
    pub docker_group: String,

    // Reachability probe limits
    pub probe_timeout_secs: u64,
    pub probe_retries: u32,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            repository_url: "https://download.docker.com/linux/ubuntu".to_string(),
            key_url: "https://download.docker.com/linux/ubuntu/gpg".to_string(),
            channel: "stable".to_string(),
            fallback_codenames: strings(&["noble", "jammy", "focal"]),

            keyring_dir: PathBuf::from("/etc/apt/keyrings"),
            keyring_path: PathBuf::from("/etc/apt/keyrings/docker.gpg"),
            source_list_path: PathBuf::from("/etc/apt/sources.list.d/docker.list"),

            os_release_path: PathBuf::from("/etc/os-release"),
            debian_version_path: PathBuf::from("/etc/debian_version"),

            prerequisite_packages: strings(&["ca-certificates", "curl", "gnupg", "lsb-release"]),
            conflicting_packages: strings(&[
                "docker.io",
                "docker-doc",
                "docker-compose",
                "docker-compose-v2",
                "podman-docker",
                "containerd",
                "runc",
            ]),
            docker_packages: strings(&[
                "docker-ce",
                "docker-ce-cli",
                "containerd.io",
                "docker-buildx-plugin",
                "docker-compose-plugin",
            ]),

            service_name: "docker".to_string(),
            docker_group: "docker".to_string(),

            probe_timeout_secs: 10,
            probe_retries: 2,
        }
    }
}

impl InstallerConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file. Missing fields keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            InstallerError::config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the defaults. Always validates.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("repository_url", &self.repository_url), ("key_url", &self.key_url)] {
            if !url.starts_with("https://") {
                return Err(InstallerError::config(format!("{} must use https: {}", name, url)));
            }
        }

        if self.channel.trim().is_empty() || self.channel.contains(char::is_whitespace) {
            return Err(InstallerError::config("channel must be a single non-empty word"));
        }

        for (name, path) in [
            ("keyring_dir", &self.keyring_dir),
            ("keyring_path", &self.keyring_path),
            ("source_list_path", &self.source_list_path),
            ("os_release_path", &self.os_release_path),
            ("debian_version_path", &self.debian_version_path),
        ] {
            if !path.is_absolute() {
                return Err(InstallerError::config(format!(
                    "{} must be an absolute path: {}",
                    name,
                    path.display()
                )));
            }
        }

        if self.keyring_path.parent() != Some(self.keyring_dir.as_path()) {
            return Err(InstallerError::config(format!(
                "keyring_path {} must live directly inside keyring_dir {}",
                self.keyring_path.display(),
                self.keyring_dir.display()
            )));
        }

        if self.prerequisite_packages.is_empty() {
            return Err(InstallerError::config("prerequisite_packages must not be empty"));
        }
        if self.docker_packages.is_empty() {
            return Err(InstallerError::config("docker_packages must not be empty"));
        }

        for pkg in self
            .prerequisite_packages
            .iter()
            .chain(&self.conflicting_packages)
            .chain(&self.docker_packages)
        {
            if !is_valid_package_name(pkg) {
                return Err(InstallerError::config(format!("invalid package name: {:?}", pkg)));
            }
        }

        for codename in &self.fallback_codenames {
            if codename.trim().is_empty() || !codename.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(InstallerError::config(format!(
                    "invalid fallback codename: {:?}",
                    codename
                )));
            }
        }

        if !is_valid_group_name(&self.docker_group) {
            return Err(InstallerError::config(format!(
                "invalid group name: {:?}",
                self.docker_group
            )));
        }

        if self.service_name.trim().is_empty() {
            return Err(InstallerError::config("service_name must not be empty"));
        }

        if self.probe_timeout_secs == 0 {
            return Err(InstallerError::config("probe_timeout_secs must be greater than zero"));
        }

        Ok(())
    }
}

/// Debian policy: lowercase alphanumerics plus `+ - .`, at least two chars,
/// starting with an alphanumeric.
fn is_valid_package_name(name: &str) -> bool {
    name.len() >= 2
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}

fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = InstallerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fallback_codenames, vec!["noble", "jammy", "focal"]);
        assert_eq!(config.docker_packages.len(), 5);
    }

    #[test]
    fn test_rejects_plain_http_repository() {
        let config = InstallerConfig {
            repository_url: "http://download.docker.com/linux/ubuntu".to_string(),
            ..InstallerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_relative_paths() {
        let config = InstallerConfig {
            source_list_path: PathBuf::from("docker.list"),
            ..InstallerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_list_path"));
    }

    #[test]
    fn test_rejects_keyring_outside_dir() {
        let config = InstallerConfig {
            keyring_path: PathBuf::from("/usr/share/keyrings/docker.gpg"),
            ..InstallerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_package_names() {
        let config = InstallerConfig {
            docker_packages: vec!["docker-ce; rm -rf /".to_string()],
            ..InstallerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = InstallerConfig {
            docker_packages: vec![],
            ..InstallerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = InstallerConfig {
            probe_timeout_secs: 0,
            ..InstallerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_package_name_rules() {
        assert!(is_valid_package_name("containerd.io"));
        assert!(is_valid_package_name("g++"));
        assert!(!is_valid_package_name("Docker"));
        assert!(!is_valid_package_name("x"));
        assert!(!is_valid_package_name("-docker"));
    }

    #[test]
    fn test_group_name_rules() {
        assert!(is_valid_group_name("docker"));
        assert!(is_valid_group_name("_docker-admins"));
        assert!(!is_valid_group_name("Docker"));
        assert!(!is_valid_group_name(""));
        assert!(!is_valid_group_name("9docker"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockstrap.json");
        std::fs::write(&path, r#"{ "probe_retries": 5, "docker_group": "dockerusers" }"#).unwrap();

        let config = InstallerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.probe_retries, 5);
        assert_eq!(config.docker_group, "dockerusers");
        assert_eq!(config.service_name, "docker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");

        let config = InstallerConfig {
            fallback_codenames: vec!["noble".to_string()],
            ..InstallerConfig::default()
        };
        config.save_to_file(&path).unwrap();

        assert_eq!(InstallerConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = InstallerConfig::load_from_file("/nonexistent/dockstrap.json").unwrap_err();
        assert!(matches!(err, InstallerError::Config(_)));
    }
}
