//! Host settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "iboz=info,iboz_core=info";

/// Settings that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// `SQLite` database file. Defaults to `<data_dir>/iboz/iboz.db`.
    pub database_path: Option<PathBuf>,
    /// Keep state in memory only; nothing survives the process.
    pub in_memory: bool,
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Deadline applied to each operation, in seconds.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            in_memory: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Location of the settings file when none is given.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iboz")
            .join("settings.json")
    }

    /// Load settings from `path`, or from [`Settings::default_path`].
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings_path = path.map_or_else(Self::default_path, Path::to_path_buf);

        if !settings_path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(&settings_path)
            .await
            .with_context(|| format!("reading settings from {}", settings_path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("parsing settings in {}", settings_path.display()))
    }

    fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Database file to open, creating its directory if needed.
    pub async fn resolve_database_path(&self) -> anyhow::Result<PathBuf> {
        let path = self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("iboz")
                .join("iboz.db")
        });

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(path)
    }

    /// Per-operation deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
