//! dockstrap library
//!
//! Installs Docker Engine on Debian-family hosts as an ordered sequence of
//! idempotent steps driven through a `CommandRunner`.

pub mod cli;
pub mod command;
pub mod config;
pub mod environment;
pub mod error;
pub mod install_state;
pub mod installer;
pub mod logging;
pub mod packages;
pub mod process_guard;
pub mod repository;
pub mod sanity;
pub mod service;
pub mod types;
pub mod verify;

// Re-export main types for convenience
pub use command::{CommandOutput, CommandRunner, DryRun, HostCommand, SystemRunner};
pub use config::InstallerConfig;
pub use environment::{HostEnvironment, OsRelease};
pub use error::InstallerError;
pub use install_state::{InstallStage, InstallTransitionError, InstallerContext};
pub use installer::{InstallPlan, InstallSummary, Installer};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use types::{Architecture, Codename, TargetUser};
