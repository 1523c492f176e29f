use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::UpdateError;
use crate::models::Version;
use crate::update::github::release_path;

/// Move the live install aside as `<install>-v<tag>`.
///
/// Fails if the target already exists, so running an update twice for the
/// same installed version stops here.
pub fn rotate_current(config: &Config, tag: &str) -> Result<PathBuf, UpdateError> {
    let current = config.install_dir();
    let target = config.rotated_dir(tag);

    if !current.is_dir() {
        return Err(UpdateError::filesystem(
            "find install directory",
            &current,
            std::io::ErrorKind::NotFound.into(),
        ));
    }
    if target.exists() {
        return Err(UpdateError::filesystem(
            "move install directory to",
            &target,
            std::io::ErrorKind::AlreadyExists.into(),
        ));
    }

    fs::rename(&current, &target)
        .map_err(|e| UpdateError::filesystem("move install directory to", &target, e))?;
    info!(from = %current.display(), to = %target.display(), "install directory rotated");
    Ok(target)
}

/// Create a fresh, empty live install directory.
pub fn prepare_directory(config: &Config) -> Result<PathBuf, UpdateError> {
    let dir = config.install_dir();
    fs::create_dir(&dir).map_err(|e| UpdateError::filesystem("create directory", &dir, e))?;
    Ok(dir)
}

/// Unpack the downloaded release archive into the live install directory.
pub fn unpack_release(config: &Config, version: &Version) -> Result<PathBuf, UpdateError> {
    let archive = release_path(config, version);
    let dest = config.install_dir();
    extract_archive(&archive, &dest)?;
    Ok(dest)
}

/// Unpack the boot and config scripts archive into the work directory.
pub fn deploy_start_files(config: &Config) -> Result<PathBuf, UpdateError> {
    let archive = config.boot_scripts_path();
    extract_archive(&archive, &config.work_dir)?;
    Ok(archive)
}

/// Extract a `.zip`, `.tar.gz` or `.tgz` archive into `dest_dir`.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), UpdateError> {
    if !archive_path.is_file() {
        return Err(UpdateError::archive(archive_path, "file not found"));
    }

    let name = archive_path.to_string_lossy();
    debug!(archive = %name, dest = %dest_dir.display(), "extracting");

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive_path, dest_dir)
    } else if name.ends_with(".zip") {
        extract_zip(archive_path, dest_dir)
    } else {
        Err(UpdateError::archive(archive_path, "unknown archive format"))
    }
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), UpdateError> {
    use flate2::read::GzDecoder;

    let file = File::open(archive_path).map_err(|e| UpdateError::archive(archive_path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    archive.set_preserve_permissions(true);

    archive
        .unpack(dest_dir)
        .map_err(|e| UpdateError::archive(archive_path, e))
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), UpdateError> {
    let file = File::open(archive_path).map_err(|e| UpdateError::archive(archive_path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| UpdateError::archive(archive_path, e))?;

    archive
        .extract(dest_dir)
        .map_err(|e| UpdateError::archive(archive_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn layout() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            root_dir: dir.path().join("root"),
            work_dir: dir.path().join("work"),
            ..Config::default()
        };
        fs::create_dir_all(config.install_dir()).unwrap();
        fs::write(config.install_dir().join("old.txt"), "old").unwrap();
        fs::create_dir_all(&config.work_dir).unwrap();
        (dir, config)
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tgz(path: &Path, files: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_rotate_current_renames_with_tag() {
        let (_dir, config) = layout();
        let rotated = rotate_current(&config, "1.0").unwrap();

        assert_eq!(rotated, config.root_dir.join("tModLoader-v1.0"));
        assert!(rotated.join("old.txt").exists());
        assert!(!config.install_dir().exists());
    }

    #[test]
    fn test_rotate_current_refuses_existing_target() {
        let (_dir, config) = layout();
        fs::create_dir_all(config.rotated_dir("1.0")).unwrap();

        let err = rotate_current(&config, "1.0").unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem { .. }));
        assert!(config.install_dir().join("old.txt").exists());
    }

    #[test]
    fn test_rotate_current_without_install() {
        let (_dir, config) = layout();
        fs::remove_dir_all(config.install_dir()).unwrap();

        let err = rotate_current(&config, "1.0").unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem { .. }));
    }

    #[test]
    fn test_prepare_directory_requires_vacant_path() {
        let (_dir, config) = layout();
        let err = prepare_directory(&config).unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem { .. }));

        rotate_current(&config, "1.0").unwrap();
        let dir = prepare_directory(&config).unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_unpack_release_zip() {
        let (_dir, config) = layout();
        let version = Version::new("2.0").unwrap();
        rotate_current(&config, "1.0").unwrap();
        prepare_directory(&config).unwrap();
        write_zip(
            &release_path(&config, &version),
            &[("tModLoader.dll", "new"), ("Libraries/a.dll", "lib")],
        );

        unpack_release(&config, &version).unwrap();

        let install = config.install_dir();
        assert_eq!(fs::read_to_string(install.join("tModLoader.dll")).unwrap(), "new");
        assert!(install.join("Libraries/a.dll").exists());
    }

    #[test]
    fn test_unpack_release_corrupt_archive() {
        let (_dir, config) = layout();
        let version = Version::new("2.0").unwrap();
        fs::write(release_path(&config, &version), "truncated").unwrap();

        let err = unpack_release(&config, &version).unwrap_err();
        assert!(matches!(err, UpdateError::Archive { .. }));
    }

    #[test]
    fn test_deploy_start_files_into_work_dir() {
        let (_dir, config) = layout();
        write_tgz(
            &config.boot_scripts_path(),
            &[("tModLoader/start.sh", "#!/bin/sh\n"), ("serverconfig.txt", "port=7777\n")],
        );

        deploy_start_files(&config).unwrap();

        assert!(config.work_dir.join("tModLoader/start.sh").exists());
        assert!(config.work_dir.join("serverconfig.txt").exists());
    }

    #[test]
    fn test_deploy_start_files_missing_archive() {
        let (_dir, config) = layout();
        let err = deploy_start_files(&config).unwrap_err();
        assert!(matches!(err, UpdateError::Archive { .. }));
    }

    #[test]
    fn test_extract_unknown_format() {
        let (_dir, config) = layout();
        let path = config.work_dir.join("release.rar");
        fs::write(&path, "rar").unwrap();
        let err = extract_archive(&path, &config.work_dir).unwrap_err();
        assert!(matches!(err, UpdateError::Archive { .. }));
    }
}
