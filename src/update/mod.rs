pub mod backup;
pub mod github;
pub mod installer;
pub mod source;
pub mod version;

use colored::Colorize;
use std::fmt::Display;
use tracing::info;

use crate::config::Config;
use crate::error::{UpdateError, UpdateFailure};
use crate::models::{Stage, Version, VersionCheck};

pub use version::is_update_available;

/// Result of a completed `update` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate(VersionCheck),
    Updated { from: Version, to: Version },
}

/// Resolve the installed and latest versions without touching the filesystem.
pub fn check_versions(config: &Config) -> Result<VersionCheck, UpdateError> {
    let installed = source::resolve_installed(config)?;
    let latest = github::resolve_latest(config)?;
    info!(%installed, %latest, "versions resolved");
    Ok(VersionCheck { latest, installed })
}

/// Print the version summary shared by `check` and `update`.
pub fn print_check(check: &VersionCheck) {
    println!("{:<18}: {}", "Installed Release", check.installed);
    println!("{:<18}: {}", "Latest Release", check.latest.to_string().green());
    if check.update_available() {
        println!("{:<18}: {}", "Update Status", "New release available".yellow());
    } else {
        println!("{:<18}: {}", "Update Status", "Up to date".green());
    }
}

/// Resolve versions and, if they differ, run the full update.
pub fn run_update(config: &Config) -> Result<UpdateOutcome, UpdateFailure> {
    let check = check_versions(config).map_err(|source| UpdateFailure {
        failed: Stage::VersionsResolved,
        completed: None,
        source,
    })?;
    print_check(&check);
    perform_update(config, &check)
}

/// Back up, replace and redeploy the server for an already resolved check.
///
/// Stops at the first failing stage. Nothing is rolled back; the returned
/// failure describes what was left on disk.
pub fn perform_update(
    config: &Config,
    check: &VersionCheck,
) -> Result<UpdateOutcome, UpdateFailure> {
    if !check.update_available() {
        return Ok(UpdateOutcome::UpToDate(check.clone()));
    }

    let installed = check.installed.as_str();
    let latest = &check.latest;
    let mut run = StageRunner::new();

    run.step(Stage::BackupExecutables, || {
        backup::backup_executables(config, installed).map(|p| p.display().to_string())
    })?;
    run.step(Stage::BackupDataFiles, || {
        backup::backup_datafiles(config, installed).map(|p| p.display().to_string())
    })?;
    run.step(Stage::Rotated, || {
        installer::rotate_current(config, installed).map(|p| p.display().to_string())
    })?;
    run.step(Stage::DirectoryPrepared, || {
        installer::prepare_directory(config).map(|p| p.display().to_string())
    })?;
    run.step(Stage::Downloaded, || {
        github::download_release(config, latest).map(|p| p.display().to_string())
    })?;
    run.step(Stage::Unpacked, || {
        installer::unpack_release(config, latest).map(|p| p.display().to_string())
    })?;
    run.step(Stage::Deployed, || {
        installer::deploy_start_files(config).map(|p| p.display().to_string())
    })?;

    Ok(UpdateOutcome::Updated {
        from: check.installed.clone(),
        to: check.latest.clone(),
    })
}

/// Tracks the last completed stage so a failure can say where it stopped.
struct StageRunner {
    completed: Option<Stage>,
}

impl StageRunner {
    fn new() -> Self {
        Self {
            completed: Some(Stage::VersionsResolved),
        }
    }

    fn step<T: Display>(
        &mut self,
        stage: Stage,
        action: impl FnOnce() -> Result<T, UpdateError>,
    ) -> Result<T, UpdateFailure> {
        match action() {
            Ok(detail) => {
                println!("{:<18}: {}", stage.label(), detail.to_string().dimmed());
                self.completed = Some(stage);
                Ok(detail)
            }
            Err(source) => {
                println!("{:<18}: {}", stage.label(), "failed".red());
                Err(UpdateFailure {
                    failed: stage,
                    completed: self.completed,
                    source,
                })
            }
        }
    }
}
