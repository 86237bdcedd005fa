//! Daemon configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to the Unix socket the daemon listens on.
    pub socket_path: PathBuf,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to preload the fixture roster at startup.
    #[serde(default = "default_seed")]
    pub seed: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_seed() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        let socket_path = dirs
            .as_ref()
            .map(|d| d.runtime_dir().unwrap_or(d.data_dir()).join("credstub.sock"))
            .unwrap_or_else(|| PathBuf::from("/tmp/credstub.sock"));

        Self {
            socket_path,
            config_path: PathBuf::new(),
            log_level: default_log_level(),
            seed: default_seed(),
        }
    }
}

/// Load configuration from the default location or create defaults.
pub fn load_config() -> Result<DaemonConfig> {
    let dirs = project_dirs();
    let config_path = dirs
        .as_ref()
        .map(|d| d.config_dir().join("daemon.toml"))
        .unwrap_or_else(|| PathBuf::from("credstub-daemon.toml"));

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        DaemonConfig::default()
    };

    config.config_path = config_path;

    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "credstub", "credstub")
}
