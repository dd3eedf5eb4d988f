//! Installer orchestration
//!
//! Runs the installation as an ordered list of steps. Each step is entered
//! through `InstallerContext` (forward-only) and its error is wrapped with
//! the step name, so a failed run reports exactly where it stopped. There is
//! no rollback: whatever earlier steps changed stays changed.

use anyhow::{Context, Result};
use std::fmt;
use tracing::info;

use crate::command::CommandRunner;
use crate::config::InstallerConfig;
use crate::environment::HostEnvironment;
use crate::install_state::{InstallStage, InstallerContext};
use crate::packages::{self, RemovalAction};
use crate::repository::{self, KeyStatus};
use crate::service::{self, AccessOutcome, GroupStatus};
use crate::types::{Codename, TargetUser};
use crate::{sanity, verify};

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct InstallSummary {
    pub environment: HostEnvironment,
    pub codename: Codename,
    pub removed_packages: Vec<String>,
    pub key: KeyStatus,
    pub group: GroupStatus,
    pub access: AccessOutcome,
    /// Number of version checks that succeeded
    pub verified: usize,
}

impl InstallSummary {
    /// True if the user must start a new login session to use docker without sudo.
    pub fn needs_relogin(&self) -> bool {
        matches!(self.access, AccessOutcome::Added)
    }
}

/// Read-only preview of what `run` would do.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub environment: HostEnvironment,
    pub candidates: Vec<Codename>,
    pub conflicts: Vec<(String, RemovalAction)>,
    pub packages: Vec<String>,
    pub group: String,
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Host: {}", self.environment)?;
        writeln!(f, "Steps:")?;
        for (i, stage) in InstallStage::steps().enumerate() {
            writeln!(f, "  {:>2}. {}", i + 1, stage)?;
        }
        let candidates: Vec<&str> = self.candidates.iter().map(Codename::as_str).collect();
        writeln!(f, "Repository codenames (in probe order): {}", candidates.join(", "))?;
        writeln!(f, "Conflicting packages:")?;
        for (pkg, action) in &self.conflicts {
            writeln!(f, "  {:<20} {}", pkg, action)?;
        }
        writeln!(f, "Packages to install: {}", self.packages.join(" "))?;
        if self.environment.target_user.is_superuser() {
            write!(f, "Group '{}': no user will be added (target is root)", self.group)
        } else {
            write!(
                f,
                "Group '{}': user '{}' will be added",
                self.group, self.environment.target_user
            )
        }
    }
}

/// Drives one installation run.
pub struct Installer<'a> {
    runner: &'a dyn CommandRunner,
    config: InstallerConfig,
    target_user: TargetUser,
    context: InstallerContext,
    skip_root_check: bool,
}

impl<'a> Installer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: InstallerConfig, target_user: TargetUser) -> Self {
        Self {
            runner,
            config,
            target_user,
            context: InstallerContext::new(),
            skip_root_check: false,
        }
    }

    /// Do not require EUID 0 in the pre-flight step.
    pub fn skip_root_check(mut self) -> Self {
        self.skip_root_check = true;
        self
    }

    pub fn context(&self) -> &InstallerContext {
        &self.context
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Enter `stage` and run `f`, attaching the stage name to any error.
    fn step<T>(
        &mut self,
        stage: InstallStage,
        f: impl FnOnce(&Self) -> crate::error::Result<T>,
    ) -> Result<T> {
        self.context.transition_to(stage)?;
        info!("==> {}", stage);
        f(&*self).with_context(|| format!("{} failed", stage))
    }

    /// Run every step in order, stopping at the first fatal error.
    pub fn run(&mut self) -> Result<InstallSummary> {
        match self.run_steps() {
            Ok(summary) => {
                self.context.advance()?;
                Ok(summary)
            }
            Err(e) => {
                // Already terminal only if the transition itself failed
                let _ = self.context.fail();
                Err(e)
            }
        }
    }

    fn run_steps(&mut self) -> Result<InstallSummary> {
        self.step(InstallStage::Preflight, |i| {
            sanity::run_preflight_checks_with_options(i.runner, i.skip_root_check)
        })?;

        let env = self.step(InstallStage::ProbingEnvironment, |i| {
            HostEnvironment::detect(i.runner, &i.config, i.target_user.clone())
        })?;

        self.step(InstallStage::ConfiguringPackageManager, |i| {
            packages::configure_noninteractive(i.runner)
        })?;

        self.step(InstallStage::InstallingPrerequisites, |i| {
            packages::install_prerequisites(i.runner, &i.config.prerequisite_packages)
        })?;

        let removed_packages = self.step(InstallStage::RemovingConflicts, |i| {
            packages::remove_conflicting(i.runner, &i.config.conflicting_packages)
        })?;

        let (codename, key) = self.step(InstallStage::RegisteringRepository, |i| {
            let codename = repository::resolve_codename(i.runner, &i.config, env.codename.as_ref())?;
            let key = repository::install_signing_key(i.runner, &i.config)?;
            repository::write_source_list(i.runner, &i.config, &env.architecture, &codename)?;
            Ok((codename, key))
        })?;

        self.step(InstallStage::InstallingPackages, |i| {
            packages::install_docker_packages(i.runner, &i.config.docker_packages)
        })?;

        let group = self.step(InstallStage::EnablingService, |i| {
            service::enable_service(i.runner, &i.config.service_name)?;
            service::ensure_group(i.runner, &i.config.docker_group)
        })?;

        let access = self.step(InstallStage::GrantingAccess, |i| {
            service::grant_access(i.runner, &env.target_user, &i.config.docker_group)
        })?;

        let verified = self.step(InstallStage::Verifying, |i| Ok(verify::report_versions(i.runner)))?;

        Ok(InstallSummary {
            environment: env,
            codename,
            removed_packages,
            key,
            group,
            access,
            verified,
        })
    }

    /// Build a preview using only read-only probes (no network access).
    pub fn plan(&self) -> Result<InstallPlan> {
        let environment = HostEnvironment::detect(self.runner, &self.config, self.target_user.clone())
            .context("Probing environment failed")?;
        let candidates = repository::candidate_codenames(
            environment.codename.as_ref(),
            &self.config.fallback_codenames,
        );
        let conflicts = packages::plan_conflict_removal(self.runner, &self.config.conflicting_packages)
            .context("Checking conflicting packages failed")?;

        Ok(InstallPlan {
            environment,
            candidates,
            conflicts,
            packages: self.config.docker_packages.clone(),
            group: self.config.docker_group.clone(),
        })
    }
}
