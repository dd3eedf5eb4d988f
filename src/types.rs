//! Strongly-typed host facts for the installer
//!
//! These replace loose strings for the values probed at startup so the
//! rest of the installer cannot mix up an architecture with a codename.

use serde::{Deserialize, Serialize};
use std::fmt;

/// dpkg package architecture (e.g. `amd64`, `arm64`).
///
/// Detection failures produce the `unknown` sentinel instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Architecture(String);

impl Architecture {
    /// Sentinel used when `dpkg --print-architecture` is unavailable or empty
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::unknown()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn is_known(&self) -> bool {
        self.0 != Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Release codename of a Debian-family distribution (e.g. `jammy`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Codename(String);

impl Codename {
    /// Returns `None` for blank input; codenames are normalized to lowercase.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_ascii_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The account that will be granted access to the Docker daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser(String);

impl TargetUser {
    pub const SUPERUSER: &'static str = "root";

    /// Resolve the target user.
    ///
    /// Precedence: explicit override, then `SUDO_USER`, then `USER`, then
    /// `root`. Blank values are treated as unset.
    pub fn resolve(explicit: Option<&str>, sudo_user: Option<&str>, user: Option<&str>) -> Self {
        let pick = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = pick(explicit)
            .or_else(|| pick(sudo_user))
            .or_else(|| pick(user))
            .unwrap_or_else(|| Self::SUPERUSER.to_string());

        Self(name)
    }

    /// Resolve from `SUDO_USER` / `USER` in the process environment.
    pub fn from_env(explicit: Option<&str>) -> Self {
        let sudo_user = std::env::var("SUDO_USER").ok();
        let user = std::env::var("USER").ok();
        Self::resolve(explicit, sudo_user.as_deref(), user.as_deref())
    }

    pub fn is_superuser(&self) -> bool {
        self.0 == Self::SUPERUSER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
