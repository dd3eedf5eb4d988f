//! Install State Machine
//!
//! `InstallerContext` owns the current stage of a run and only allows moving
//! to the next stage in order, or to `Failed`. When a step fails, the context
//! remembers which stage it was in so the final error names it.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! Preflight
//!     ↓
//! ProbingEnvironment
//!     ↓
//! ConfiguringPackageManager
//!     ↓
//! InstallingPrerequisites
//!     ↓
//! RemovingConflicts
//!     ↓
//! RegisteringRepository
//!     ↓
//! InstallingPackages
//!     ↓
//! EnablingService
//!     ↓
//! GrantingAccess
//!     ↓
//! Verifying
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Installation stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum InstallStage {
    NotStarted = 0,
    /// Root, Debian-family host, apt/dpkg present
    Preflight = 1,
    /// Architecture, codename, target user
    ProbingEnvironment = 2,
    /// Non-interactive apt/dpkg settings
    ConfiguringPackageManager = 3,
    /// ca-certificates, curl, gnupg, lsb-release
    InstallingPrerequisites = 4,
    RemovingConflicts = 5,
    /// Codename resolution, signing key, source list
    RegisteringRepository = 6,
    InstallingPackages = 7,
    EnablingService = 8,
    GrantingAccess = 9,
    Verifying = 10,
    Completed = 11,
    Failed = 255,
}

impl InstallStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the next stage in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Preflight),
            Self::Preflight => Some(Self::ProbingEnvironment),
            Self::ProbingEnvironment => Some(Self::ConfiguringPackageManager),
            Self::ConfiguringPackageManager => Some(Self::InstallingPrerequisites),
            Self::InstallingPrerequisites => Some(Self::RemovingConflicts),
            Self::RemovingConflicts => Some(Self::RegisteringRepository),
            Self::RegisteringRepository => Some(Self::InstallingPackages),
            Self::InstallingPackages => Some(Self::EnablingService),
            Self::EnablingService => Some(Self::GrantingAccess),
            Self::GrantingAccess => Some(Self::Verifying),
            Self::Verifying => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Preflight => "Pre-flight checks",
            Self::ProbingEnvironment => "Probing environment",
            Self::ConfiguringPackageManager => "Configuring package manager",
            Self::InstallingPrerequisites => "Installing prerequisites",
            Self::RemovingConflicts => "Removing conflicting packages",
            Self::RegisteringRepository => "Registering Docker repository",
            Self::InstallingPackages => "Installing Docker packages",
            Self::EnablingService => "Enabling Docker service",
            Self::GrantingAccess => "Granting user access",
            Self::Verifying => "Verifying installation",
            Self::Completed => "Installation complete",
            Self::Failed => "Installation failed",
        }
    }

    /// The stages that do work, in execution order.
    pub fn steps() -> impl Iterator<Item = Self> {
        Self::iter().filter(|s| !matches!(s, Self::NotStarted | Self::Completed | Self::Failed))
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: InstallStage, to: InstallStage },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: InstallStage, to: InstallStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

/// Tracks the progress of a single installer run.
///
/// ```
/// use dockstrap::install_state::{InstallerContext, InstallStage};
///
/// let mut ctx = InstallerContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), InstallStage::Preflight);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(InstallStage::InstallingPackages).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InstallerContext {
    current: InstallStage,
    failed_at: Option<InstallStage>,
    history: Vec<InstallStage>,
}

impl Default for InstallerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallerContext {
    pub fn new() -> Self {
        Self {
            current: InstallStage::NotStarted,
            failed_at: None,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<InstallStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == InstallStage::Completed
    }

    /// Stages entered so far, in order.
    pub fn history(&self) -> &[InstallStage] {
        &self.history
    }

    /// Advance to the next stage in sequence.
    pub fn advance(&mut self) -> Result<InstallStage, InstallTransitionError> {
        let Some(next) = self.current.next() else {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        };
        self.enter(next);
        Ok(next)
    }

    /// Transition to `target`, which must be the immediate next stage.
    pub fn transition_to(
        &mut self,
        target: InstallStage,
    ) -> Result<InstallStage, InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(InstallTransitionError::AlreadyAtStage { stage: target });
        }
        if target != InstallStage::Failed && target.order() < self.current.order() {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.enter(target);
        Ok(target)
    }

    /// Mark the run as failed at the current stage.
    pub fn fail(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.enter(InstallStage::Failed);
        Ok(())
    }

    fn enter(&mut self, stage: InstallStage) {
        self.history.push(stage);
        self.current = stage;
    }
}

impl From<InstallTransitionError> for crate::error::InstallerError {
    fn from(err: InstallTransitionError) -> Self {
        crate::error::InstallerError::install_transition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_next_forms_chain() {
        let mut current = InstallStage::NotStarted;
        let mut count = 0;

        while let Some(next) = current.next() {
            current = next;
            count += 1;
            assert!(count < 20, "Infinite loop detected in stage chain");
        }

        assert_eq!(current, InstallStage::Completed);
        assert_eq!(count, 11);
    }

    #[test]
    fn test_steps_match_chain_order() {
        let steps: Vec<InstallStage> = InstallStage::steps().collect();
        assert_eq!(steps.first(), Some(&InstallStage::Preflight));
        assert_eq!(steps.last(), Some(&InstallStage::Verifying));
        for pair in steps.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
    }

    #[test]
    fn test_cannot_skip_stage() {
        let mut ctx = InstallerContext::new();
        ctx.advance().unwrap();
        let err = ctx.transition_to(InstallStage::RemovingConflicts).unwrap_err();
        assert!(matches!(err, InstallTransitionError::SkippedStage { .. }));
    }

    #[test]
    fn test_cannot_go_backwards() {
        let mut ctx = InstallerContext::new();
        ctx.advance().unwrap();
        ctx.advance().unwrap();
        let err = ctx.transition_to(InstallStage::Preflight).unwrap_err();
        assert!(matches!(err, InstallTransitionError::BackwardTransition { .. }));
    }

    #[test]
    fn test_fail_records_stage() {
        let mut ctx = InstallerContext::new();
        ctx.advance().unwrap();
        ctx.advance().unwrap();
        ctx.fail().unwrap();

        assert_eq!(ctx.current_stage(), InstallStage::Failed);
        assert_eq!(ctx.failed_at(), Some(InstallStage::ProbingEnvironment));
        assert!(ctx.advance().is_err());
        assert!(ctx.fail().is_err());
    }

    #[test]
    fn test_full_run_completes() {
        let mut ctx = InstallerContext::new();
        for stage in InstallStage::steps() {
            ctx.transition_to(stage).unwrap();
        }
        ctx.advance().unwrap();
        assert!(ctx.is_complete());
        assert_eq!(ctx.history().len(), 11);
    }
}
