//! Process configuration, read once at startup.
//!
//! ```toml
//! db_path = "/var/lib/memoir/memoir.sqlite3"
//! log_level = "info"
//!
//! [import]
//! enabled = true
//! folders = "Camera, Screenshots"
//! fallback_folder = "MemoirMock"
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_DB_FILE: &str = "memoir.sqlite3";
const IMPORT_ALL_FOLDERS_TOKEN: &str = "*";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoirConfig {
    pub db_path: PathBuf,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub import: ImportConfig,
}

impl Default for MemoirConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: None,
            log_dir: None,
            import: ImportConfig::default(),
        }
    }
}

impl MemoirConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("event=config_load module=config status=ok source=defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "event=config_load module=config status=ok source=file import_enabled={}",
            config.import.enabled
        );
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Startup import switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub enabled: bool,
    /// Comma-separated folder allow-list; `*` selects every folder.
    pub folders: String,
    /// Single folder used when `folders` lists nothing.
    pub fallback_folder: String,
}

impl ImportConfig {
    /// Folder names to import from, or `None` for every folder.
    pub fn target_folders(&self) -> Option<BTreeSet<String>> {
        let mut folders: BTreeSet<String> = self
            .folders
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let fallback = self.fallback_folder.trim();
        if folders.is_empty() && !fallback.is_empty() {
            folders.insert(fallback.to_string());
        }

        if folders.contains(IMPORT_ALL_FOLDERS_TOKEN) {
            return None;
        }
        Some(folders)
    }
}
