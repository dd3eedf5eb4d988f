//! Docker apt repository registration
//!
//! - Picks the first codename whose `dists/<codename>/Release` answers
//! - Fetches and dearmors the signing key once (an existing key is kept)
//! - Writes the single-line source list, replacing any previous one

use crate::command::{CommandRunner, HostCommand};
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::types::{Architecture, Codename};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{debug, info, warn};

const KEYRING_DIR_MODE: u32 = 0o755;
const DOWNLOAD_MODE: u32 = 0o600;
const KEYRING_MODE: u32 = 0o644;
const SOURCE_LIST_MODE: u32 = 0o644;

/// Candidate codenames in probe order: detected first, then fallbacks,
/// without duplicates.
pub fn candidate_codenames(detected: Option<&Codename>, fallbacks: &[String]) -> Vec<Codename> {
    let mut candidates: Vec<Codename> = Vec::new();
    let all = detected
        .cloned()
        .into_iter()
        .chain(fallbacks.iter().filter_map(|c| Codename::new(c)));

    for codename in all {
        if !candidates.contains(&codename) {
            candidates.push(codename);
        }
    }
    candidates
}

/// URL whose presence proves the repository serves `codename`.
pub fn release_url(repository_url: &str, codename: &Codename) -> String {
    format!("{}/dists/{}/Release", repository_url.trim_end_matches('/'), codename)
}

/// HEAD request with bounded timeout and retries.
pub fn probe_command(url: &str, timeout_secs: u64, retries: u32) -> HostCommand {
    HostCommand::new("curl")
        .args(["-fsSL", "-I", "-o", "/dev/null"])
        .args(["--max-time".to_string(), timeout_secs.to_string()])
        .args(["--retry".to_string(), retries.to_string()])
        .arg(url)
}

/// Return the first candidate whose repository responds.
pub fn resolve_codename(
    runner: &dyn CommandRunner,
    config: &InstallerConfig,
    detected: Option<&Codename>,
) -> Result<Codename> {
    let candidates = candidate_codenames(detected, &config.fallback_codenames);

    for codename in &candidates {
        let url = release_url(&config.repository_url, codename);
        let probe = probe_command(&url, config.probe_timeout_secs, config.probe_retries);

        match runner.run(&probe) {
            Ok(out) if out.success => {
                info!("Using Docker repository for '{}'", codename);
                return Ok(codename.clone());
            }
            Ok(out) => warn!(
                "No Docker repository for '{}' (curl exit {})",
                codename,
                out.exit_code.unwrap_or(-1)
            ),
            Err(e) => warn!("Probe for '{}' failed: {}", codename, e),
        }
    }

    Err(InstallerError::NoReachableRepository {
        tried: candidates.iter().map(ToString::to_string).collect(),
    })
}

/// Outcome of the signing key step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    AlreadyPresent,
    Installed,
}

fn key_present(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Create the keyring directory with mode 0755 if it does not exist.
pub fn ensure_keyring_dir(runner: &dyn CommandRunner, config: &InstallerConfig) -> Result<()> {
    let dir = &config.keyring_dir;
    if dir.is_dir() {
        return Ok(());
    }
    if runner.is_dry_run() {
        runner.note_skipped(&format!("create {} (mode 0755)", dir.display()));
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    set_mode(dir, KEYRING_DIR_MODE)?;
    debug!("Created {}", dir.display());
    Ok(())
}

/// Download and dearmor the repository signing key unless it already exists.
pub fn install_signing_key(runner: &dyn CommandRunner, config: &InstallerConfig) -> Result<KeyStatus> {
    let keyring = &config.keyring_path;
    if key_present(keyring) {
        info!("Signing key already present at {}", keyring.display());
        return Ok(KeyStatus::AlreadyPresent);
    }

    ensure_keyring_dir(runner, config)?;

    let download = keyring.with_extension("asc.download");
    info!("Fetching signing key from {}", config.key_url);

    runner.run_checked(
        &HostCommand::new("curl")
            .arg("-fsSL")
            .args(["--max-time".to_string(), config.probe_timeout_secs.to_string()])
            .args(["--retry".to_string(), config.probe_retries.to_string()])
            .arg("-o")
            .arg(download.to_string_lossy())
            .arg(config.key_url.as_str())
            .mutating(),
    )?;

    if !runner.is_dry_run() {
        set_mode(&download, DOWNLOAD_MODE)?;
    }

    let dearmor = runner.run_checked(
        &HostCommand::new("gpg")
            .args(["--batch", "--yes", "--dearmor", "-o"])
            .arg(keyring.to_string_lossy())
            .arg(download.to_string_lossy())
            .mutating(),
    );

    if !runner.is_dry_run() {
        if let Err(e) = fs::remove_file(&download) {
            debug!("Could not remove {}: {}", download.display(), e);
        }
    }

    if let Err(e) = dearmor {
        // A partial keyring would make the next run skip the fetch
        if keyring.exists() {
            let _ = fs::remove_file(keyring);
        }
        return Err(e);
    }

    if runner.is_dry_run() {
        runner.note_skipped(&format!("chmod a+r {}", keyring.display()));
    } else {
        set_mode(keyring, KEYRING_MODE)?;
    }

    info!("Signing key stored at {}", keyring.display());
    Ok(KeyStatus::Installed)
}

/// The single `deb` line for the Docker repository.
///
/// `arch=` is omitted when the architecture could not be detected so apt
/// falls back to the native architecture.
pub fn source_list_entry(
    architecture: &Architecture,
    keyring: &Path,
    repository_url: &str,
    codename: &Codename,
    channel: &str,
) -> String {
    let mut options = Vec::new();
    if architecture.is_known() {
        options.push(format!("arch={}", architecture));
    }
    options.push(format!("signed-by={}", keyring.display()));

    format!(
        "deb [{}] {} {} {}",
        options.join(" "),
        repository_url.trim_end_matches('/'),
        codename,
        channel
    )
}

/// Write (or overwrite) the repository definition file.
pub fn write_source_list(
    runner: &dyn CommandRunner,
    config: &InstallerConfig,
    architecture: &Architecture,
    codename: &Codename,
) -> Result<()> {
    if !architecture.is_known() {
        warn!("Architecture unknown; source list will not be pinned to an architecture");
    }

    let line = source_list_entry(
        architecture,
        &config.keyring_path,
        &config.repository_url,
        codename,
        &config.channel,
    );
    let path = &config.source_list_path;

    if runner.is_dry_run() {
        runner.note_skipped(&format!("write {}: {}", path.display(), line));
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", line))?;
    set_mode(path, SOURCE_LIST_MODE)?;

    info!("Wrote {}", path.display());
    debug!("{}", line);
    Ok(())
}
