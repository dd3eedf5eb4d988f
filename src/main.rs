//! dockstrap - Main entry point
//!
//! Exit codes: 0 on success, 1 on any failure, 128+N when killed by signal N.

use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use dockstrap::cli::{Cli, Commands};
use dockstrap::command::{CommandRunner, DryRun, SystemRunner};
use dockstrap::config::InstallerConfig;
use dockstrap::installer::Installer;
use dockstrap::types::TargetUser;
use dockstrap::{logging, process_guard};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    // Interrupted children must not keep running after we exit
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Config { dump, validate }) => run_config_command(cli, *dump, validate.as_deref()),
        Some(Commands::Plan) => {
            let config = InstallerConfig::load_or_default(cli.config.as_deref())?;
            let installer = Installer::new(&SystemRunner, config, TargetUser::from_env(cli.user.as_deref()));
            println!("{}", installer.plan()?);
            Ok(())
        }
        Some(Commands::Install) | None => {
            let config = InstallerConfig::load_or_default(cli.config.as_deref())?;
            if cli.dry_run {
                let runner = DryRun::new(SystemRunner);
                install(&runner, config, cli)?;
                info!("Dry run finished; {} action(s) skipped", runner.skipped().len());
                Ok(())
            } else {
                install(&SystemRunner, config, cli)
            }
        }
    }
}

fn install(runner: &dyn CommandRunner, config: InstallerConfig, cli: &Cli) -> anyhow::Result<()> {
    let target_user = TargetUser::from_env(cli.user.as_deref());
    let mut installer = Installer::new(runner, config, target_user);
    let summary = installer.run()?;

    info!(
        "Docker Engine installed from the '{}' repository on {}",
        summary.codename, summary.environment.distribution
    );
    if !summary.removed_packages.is_empty() {
        info!("Removed conflicting packages: {}", summary.removed_packages.join(", "));
    }
    info!("Installation complete");
    if summary.needs_relogin() {
        info!(
            "Tip: log out and back in (or run `newgrp {}`) so '{}' can use docker without sudo",
            installer.config().docker_group,
            summary.environment.target_user
        );
    } else {
        info!("Tip: run `docker run hello-world` to check that the daemon works");
    }
    Ok(())
}

fn run_config_command(cli: &Cli, dump: bool, validate: Option<&std::path::Path>) -> anyhow::Result<()> {
    if let Some(path) = validate {
        InstallerConfig::load_or_default(Some(path))?;
        info!("Configuration file is valid: {}", path.display());
    }

    if dump || validate.is_none() {
        let config = InstallerConfig::load_or_default(cli.config.as_deref())?;
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}
