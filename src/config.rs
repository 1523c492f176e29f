use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LATEST_URL: &str = "https://github.com/tModLoader/tModLoader/releases/latest";
const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/tModLoader/tModLoader/releases";

/// Paths and endpoints for one server installation.
///
/// Relative `data_dir` and `log_file` are resolved against `root_dir`;
/// relative `backup_dir`, `state_file` and `boot_scripts` against `work_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub root_dir: PathBuf,
    pub install_dir_name: String,
    pub data_dir: PathBuf,
    pub work_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub boot_scripts: PathBuf,
    pub latest_url: String,
    pub download_base: String,
    pub archive_name: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/root"),
            install_dir_name: "tModLoader".to_string(),
            data_dir: PathBuf::from(".local/share/Terraria"),
            work_dir: PathBuf::from("."),
            backup_dir: PathBuf::from("backup"),
            state_file: PathBuf::from("version_update.json"),
            log_file: PathBuf::from("tModLoader/tModLoader-Logs/server.log"),
            boot_scripts: PathBuf::from("tModBootScripts.tgz"),
            latest_url: DEFAULT_LATEST_URL.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            archive_name: "tModLoader.zip".to_string(),
            http_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the user config file if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(anyhow!("Config file not found: {}", p.display()));
                }
                p.to_path_buf()
            }
            None => {
                let default_path = Self::config_path();
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config in {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.install_dir_name.is_empty() {
            return Err(anyhow!("install_dir_name must not be empty"));
        }
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tmod-update")
            .join("config.toml")
    }

    /// The live install directory, e.g. `/root/tModLoader`.
    pub fn install_dir(&self) -> PathBuf {
        self.root_dir.join(&self.install_dir_name)
    }

    /// Where the live install is moved before a new one is unpacked.
    pub fn rotated_dir(&self, tag: &str) -> PathBuf {
        self.root_dir.join(format!("{}-v{}", self.install_dir_name, tag))
    }

    pub fn data_path(&self) -> PathBuf {
        self.root_dir.join(&self.data_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(&self.log_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.work_dir.join(&self.backup_dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.work_dir.join(&self.state_file)
    }

    pub fn boot_scripts_path(&self) -> PathBuf {
        self.work_dir.join(&self.boot_scripts)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
