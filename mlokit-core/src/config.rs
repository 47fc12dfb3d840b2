//! Tool configuration
//!
//! Defines the optional `mlokit.json` file. Every field has a default, so a
//! missing file behaves exactly like an empty one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::manifest::ManifestFormat;

/// Config file name looked up by [`ToolConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "mlokit.json";

/// Directory name of the prop lookup database
pub const DATABASE_DIR_NAME: &str = "DATA_BASE";

/// Default replacement for `value="false"` door angles (radians)
pub const DEFAULT_DOOR_ANGLE: &str = "1.470796";

/// Errors that can occur when loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    /// Prop lookup database; defaults to `DATA_BASE` next to the executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_dir: Option<PathBuf>,

    /// Angle written over `value="false"` when none is supplied
    #[serde(default = "default_angle")]
    pub default_angle: String,

    /// Output flavour for generated manifests
    #[serde(default)]
    pub manifest_format: ManifestFormat,

    /// Trailing directory components that hold probe exports
    #[serde(default = "default_probe_path_suffix")]
    pub probe_path_suffix: Vec<String>,

    /// File name suffix of probe fragments
    #[serde(default = "default_probe_file_suffix")]
    pub probe_file_suffix: String,
}

fn default_angle() -> String {
    DEFAULT_DOOR_ANGLE.to_string()
}

fn default_probe_path_suffix() -> Vec<String> {
    vec!["ref_probes".to_string(), "output".to_string()]
}

fn default_probe_file_suffix() -> String {
    "_YTYP.xml".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            database_dir: None,
            default_angle: default_angle(),
            manifest_format: ManifestFormat::default(),
            probe_path_suffix: default_probe_path_suffix(),
            probe_file_suffix: default_probe_file_suffix(),
        }
    }
}

impl ToolConfig {
    /// Parse a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ToolConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load `mlokit.json` from `dir`, or defaults when there is none
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let candidate = dir.as_ref().join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!("Using config file {:?}", candidate);
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// The database directory to scan, if one exists on disk
    ///
    /// An explicit `databaseDir` is returned only when it is a directory.
    /// Otherwise `DATA_BASE` is looked up next to the executable, then in
    /// the current directory.
    pub fn resolve_database_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.database_dir {
            return dir.is_dir().then(|| dir.clone());
        }

        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.join(DATABASE_DIR_NAME)));
        let in_cwd = std::env::current_dir()
            .ok()
            .map(|cwd| cwd.join(DATABASE_DIR_NAME));

        [beside_exe, in_cwd]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
    }
}
