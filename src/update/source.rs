use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::UpdateError;
use crate::models::Version;
use crate::update::version::parse_log_line;

/// One way of finding out which version is installed.
///
/// `Ok(None)` means "no answer here, try the next strategy".
pub trait InstalledVersionStrategy {
    fn name(&self) -> &'static str;
    fn resolve(&self) -> Result<Option<Version>, UpdateError>;
}

#[derive(Debug, Deserialize)]
struct StateRecord {
    #[serde(default)]
    version: Option<String>,
}

/// Reads `{"version": "..."}` from the JSON state file.
pub struct StateFileStrategy {
    path: PathBuf,
}

impl StateFileStrategy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InstalledVersionStrategy for StateFileStrategy {
    fn name(&self) -> &'static str {
        "state file"
    }

    fn resolve(&self) -> Result<Option<Version>, UpdateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file not found");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable");
                return Ok(None);
            }
        };

        match serde_json::from_str::<StateRecord>(&content) {
            Ok(record) => Ok(record.version.and_then(Version::new)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file is not valid JSON");
                Ok(None)
            }
        }
    }
}

/// Parses the version out of the first line of the server log.
pub struct ServerLogStrategy {
    path: PathBuf,
}

impl ServerLogStrategy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InstalledVersionStrategy for ServerLogStrategy {
    fn name(&self) -> &'static str {
        "server log"
    }

    fn resolve(&self) -> Result<Option<Version>, UpdateError> {
        let Some(line) = read_first_line(&self.path) else {
            return Ok(None);
        };
        let version = parse_log_line(&line);
        if version.is_none() {
            warn!(path = %self.path.display(), "no version token in first log line");
        }
        Ok(version)
    }
}

/// Missing or unreadable logs yield `None` so resolution ends in `StateUnavailable`.
fn read_first_line(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "server log not found");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "server log unreadable");
            return None;
        }
    };

    let mut line = String::new();
    if let Err(e) = BufReader::new(file).read_line(&mut line) {
        warn!(path = %path.display(), error = %e, "server log unreadable");
        return None;
    }
    Some(line)
}

/// Run strategies in order; the first one that yields a version wins.
pub fn resolve_with(
    strategies: &[&dyn InstalledVersionStrategy],
) -> Result<Option<Version>, UpdateError> {
    for strategy in strategies {
        if let Some(version) = strategy.resolve()? {
            debug!(source = strategy.name(), %version, "installed version resolved");
            return Ok(Some(version));
        }
    }
    Ok(None)
}

/// Installed version from the state file, falling back to the server log.
pub fn resolve_installed(config: &Config) -> Result<Version, UpdateError> {
    let state_file = config.state_path();
    let log_file = config.log_path();

    let state = StateFileStrategy::new(&state_file);
    let log = ServerLogStrategy::new(&log_file);

    resolve_with(&[&state, &log])?.ok_or(UpdateError::StateUnavailable {
        state_file,
        log_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixed(Option<&'static str>);

    impl InstalledVersionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn resolve(&self) -> Result<Option<Version>, UpdateError> {
            Ok(self.0.and_then(Version::new))
        }
    }

    fn layout() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            root_dir: dir.path().join("root"),
            work_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        fs::create_dir_all(config.log_path().parent().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_first_strategy_with_answer_wins() {
        let none = Fixed(None);
        let first = Fixed(Some("1.0"));
        let second = Fixed(Some("2.0"));
        let result = resolve_with(&[&none, &first, &second]).unwrap();
        assert_eq!(result, Version::new("1.0"));
        assert_eq!(resolve_with(&[&none]).unwrap(), None);
    }

    #[test]
    fn test_state_file_preferred_over_log() {
        let (_dir, config) = layout();
        fs::write(config.state_path(), r#"{"version": "2023.8.3.4"}"#).unwrap();
        fs::write(config.log_path(), "1.2+3.4|tModLoader|extra\nsecond line\n").unwrap();

        assert_eq!(resolve_installed(&config).unwrap().as_str(), "2023.8.3.4");
    }

    #[test]
    fn test_falls_back_to_log_without_state_file() {
        let (_dir, config) = layout();
        fs::write(config.log_path(), "1.2+3.4|tModLoader|extra\n9.9+9.9|x\n").unwrap();

        assert_eq!(resolve_installed(&config).unwrap().as_str(), "1.2");
    }

    #[test]
    fn test_falls_back_when_state_has_no_version() {
        let (_dir, config) = layout();
        fs::write(config.state_path(), r#"{"version": "", "other": 1}"#).unwrap();
        fs::write(config.log_path(), "1.2+3.4|tModLoader\n").unwrap();
        assert_eq!(resolve_installed(&config).unwrap().as_str(), "1.2");

        fs::write(config.state_path(), r#"{"other": 1}"#).unwrap();
        assert_eq!(resolve_installed(&config).unwrap().as_str(), "1.2");

        fs::write(config.state_path(), "not json").unwrap();
        assert_eq!(resolve_installed(&config).unwrap().as_str(), "1.2");
    }

    #[test]
    fn test_nothing_available() {
        let (_dir, config) = layout();
        let err = resolve_installed(&config).unwrap_err();
        assert!(matches!(err, UpdateError::StateUnavailable { .. }));

        fs::write(config.log_path(), "").unwrap();
        let err = resolve_installed(&config).unwrap_err();
        assert!(matches!(err, UpdateError::StateUnavailable { .. }));
    }

    #[test]
    fn test_unreadable_log_is_state_unavailable() {
        let (_dir, config) = layout();
        fs::create_dir_all(config.log_path()).unwrap();

        let err = resolve_installed(&config).unwrap_err();
        match err {
            UpdateError::StateUnavailable { state_file, log_file } => {
                assert_eq!(state_file, config.state_path());
                assert_eq!(log_file, config.log_path());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_log_is_state_unavailable() {
        let (_dir, config) = layout();
        fs::write(config.log_path(), [0xff, 0xfe, b'+', b'1', b'\n']).unwrap();

        let err = resolve_installed(&config).unwrap_err();
        assert!(matches!(err, UpdateError::StateUnavailable { .. }));
    }
}
