use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dockstrap - install Docker Engine on Debian/Ubuntu
///
/// Running without a subcommand performs the installation.
#[derive(Parser)]
#[command(name = "dockstrap")]
#[command(about = "Installs Docker Engine, its CLI and plugins from Docker's apt repository")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: probe the host but do not change anything.
    ///
    /// Read-only checks (dpkg-query, getent, id, repository probes) still
    /// run; apt, gpg, systemctl, usermod and file writes are only logged.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// JSON file overriding the built-in configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// User to add to the docker group (default: $SUDO_USER, then $USER)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Log every executed command
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install Docker Engine (the default)
    Install,
    /// Show the detected host and the steps that would run
    Plan,
    /// Inspect configuration
    Config {
        /// Print the effective configuration as JSON
        #[arg(long)]
        dump: bool,
        /// Validate a configuration file
        #[arg(long, value_name = "PATH")]
        validate: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse `std::env::args`, exiting 1 on invalid arguments and 0 after
    /// `--help` or `--version`.
    pub fn parse_args() -> Self {
        match <Self as clap::Parser>::try_parse() {
            Ok(cli) => cli,
            Err(e) => {
                let code = parse_error_exit_code(&e);
                let _ = e.print();
                std::process::exit(code);
            }
        }
    }
}

/// Exit code for a clap error: help/version output is not a failure.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() { 1 } else { 0 }
}
