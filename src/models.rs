use std::fmt;

use crate::update::version::is_update_available;

/// An opaque release identifier such as `2023.8.3.4`.
///
/// Only equality is meaningful. No ordering or semver parsing is applied,
/// so `1.4.4` and `v1.4.4` are different versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Returns `None` for empty or whitespace-only tokens.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Both sides of a version check, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub latest: Version,
    pub installed: Version,
}

impl VersionCheck {
    pub fn update_available(&self) -> bool {
        is_update_available(&self.latest, &self.installed)
    }
}

/// Steps of the update workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    VersionsResolved,
    BackupExecutables,
    BackupDataFiles,
    Rotated,
    DirectoryPrepared,
    Downloaded,
    Unpacked,
    Deployed,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VersionsResolved => "Resolve versions",
            Self::BackupExecutables => "Backup executables",
            Self::BackupDataFiles => "Backup data files",
            Self::Rotated => "Move current install",
            Self::DirectoryPrepared => "Prepare directory",
            Self::Downloaded => "Retrieve release",
            Self::Unpacked => "Unpack release",
            Self::Deployed => "Deploy start files",
        }
    }

    /// What the filesystem looks like once this stage has completed and
    /// nothing after it has.
    pub fn recovery_note(&self) -> &'static str {
        match self {
            Self::VersionsResolved => "nothing was changed",
            Self::BackupExecutables => {
                "executables archive written to the backup directory; install untouched"
            }
            Self::BackupDataFiles => "backups written; install untouched",
            Self::Rotated => {
                "old install was moved aside and the live install path is missing; \
                 rename it back to recover"
            }
            Self::DirectoryPrepared => {
                "old install was moved aside and the live install path is empty"
            }
            Self::Downloaded => {
                "old install was moved aside; the release archive is downloaded \
                 but not unpacked"
            }
            Self::Unpacked => "new release is unpacked but start files were not deployed",
            Self::Deployed => "update completed",
        }
    }
}
