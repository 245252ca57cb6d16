use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub bridge: BridgeConfig,
    pub host: HostConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Capability whose presence marks the host as initialized.
    pub liveness_marker: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            liveness_marker: "save_user".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub word_list: String,
    pub completion_delay_ms: u64,
}

impl HostConfig {
    pub fn word_list_path(&self) -> PathBuf {
        PathBuf::from(&self.word_list)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        match directories::ProjectDirs::from("", "", "forca") {
            Some(proj_dirs) => Self::load_from(&proj_dirs.config_dir().join("config.toml")),
            None => Self::from_toml_str(DEFAULTS),
        }
    }

    /// Defaults, replaced by `path` when it exists.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Self::from_toml_str(DEFAULTS);
        }

        let user_str = fs::read_to_string(path)?;
        Self::from_toml_str(&user_str).map_err(|err| anyhow!("{}: {err}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(raw)?;

        // Expand ~ in word_list
        if config.host.word_list.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.host.word_list = config
                .host
                .word_list
                .replacen('~', &home.to_string_lossy(), 1);
        }

        if config.bridge.liveness_marker.trim().is_empty() {
            return Err(anyhow!("bridge.liveness_marker must not be empty"));
        }

        Ok(config)
    }

    pub fn defaults() -> Result<Self> {
        Self::from_toml_str(DEFAULTS)
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
