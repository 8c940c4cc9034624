use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the settings file inside the platform config directory
pub const SETTINGS_FILE: &str = "settings.toml";

/// Platform disk utility used for erasing volumes
pub const DEFAULT_DISKUTIL_PATH: &str = "/usr/sbin/diskutil";

/// Mount root that removable media appear under
pub const DEFAULT_REMOVABLE_ROOT: &str = "Volumes";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "rpi-formatter", "rpi-formatter")
}

/// Read-only application settings.
///
/// Every field has a default, so a partial (or absent) settings file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub diskutil_path: PathBuf,
    pub removable_root: String,
    pub poll_interval_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            diskutil_path: PathBuf::from(DEFAULT_DISKUTIL_PATH),
            removable_root: DEFAULT_REMOVABLE_ROOT.to_string(),
            poll_interval_ms: 1000,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the platform config directory.
    ///
    /// A missing file yields the defaults. The file is never created or written.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::settings_path() else {
            debug!("No config directory available, using default settings");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        if settings.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if settings.removable_root.is_empty() || settings.removable_root.contains('/') {
            anyhow::bail!(
                "removable_root must be a single path component, got {:?}",
                settings.removable_root
            );
        }
        Ok(settings)
    }

    pub fn settings_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
