use chrono::Local;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::UpdateError;

/// Archive the live install directory into the backup directory.
pub fn backup_executables(config: &Config, tag: &str) -> Result<PathBuf, UpdateError> {
    let name = archive_name("tMod-execs", tag);
    let tree = Path::new(&config.install_dir_name);
    create_backup(config, &config.install_dir(), tree, &name)
}

/// Archive the server data directory (worlds, mods, players).
pub fn backup_datafiles(config: &Config, tag: &str) -> Result<PathBuf, UpdateError> {
    let name = archive_name("tMod-datafiles", tag);
    let tree = entry_root(&config.data_dir);
    create_backup(config, &config.data_path(), tree, &name)
}

/// Archive entries must be relative, so an absolute tree is rooted at its
/// last component.
fn entry_root(tree: &Path) -> &Path {
    if tree.is_absolute() {
        tree.file_name().map(Path::new).unwrap_or(Path::new("data"))
    } else {
        tree
    }
}

fn archive_name(prefix: &str, tag: &str) -> String {
    let stamp = Local::now().format("%Y%m%d-%H%M%S-%6f");
    format!("{}-{}-{}.tar.gz", prefix, tag, stamp)
}

/// Pack `source` into `name` with entries rooted at `tree`, then move the
/// archive into the backup directory.
fn create_backup(
    config: &Config,
    source: &Path,
    tree: &Path,
    name: &str,
) -> Result<PathBuf, UpdateError> {
    if !source.is_dir() {
        return Err(UpdateError::backup(source, "source directory does not exist"));
    }

    let backup_dir = config.backup_path();
    let dest = backup_dir.join(name);
    if dest.exists() {
        return Err(UpdateError::backup(&dest, "archive already exists"));
    }

    let staged = config.work_dir.join(name);
    info!(source = %source.display(), archive = %staged.display(), "creating backup");

    if let Err(e) = write_tar_gz(source, tree, &staged) {
        let _ = fs::remove_file(&staged);
        return Err(UpdateError::backup(source, e));
    }

    fs::create_dir_all(&backup_dir).map_err(|e| UpdateError::backup(&backup_dir, e))?;
    fs::rename(&staged, &dest).map_err(|e| UpdateError::backup(&dest, e))?;

    debug!(archive = %dest.display(), "backup stored");
    Ok(dest)
}

fn write_tar_gz(source: &Path, tree: &Path, dest: &Path) -> io::Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let name = tree.join(relative);

        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?.sync_all()
}
