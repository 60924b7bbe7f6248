//! 配置路径管理
//!
//! - Persistent settings live in the user config dir (`<config>/scripthub/`),
//!   overridable through `SCRIPTHUB_CONFIG_DIR`
//! - Runtime data (the log file) goes to the system temp dir

use crate::config::{APP_DIRECTORY, CONFIG_DIR_ENV, CONFIG_FILENAME};
use crate::error::SettingsError;
use std::path::PathBuf;

/// 配置文件路径集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self, SettingsError> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or(SettingsError::NoConfigDir)?
                .join(APP_DIRECTORY),
        };
        Ok(Self::rooted_at(config_dir))
    }

    /// Paths for an explicit settings directory
    pub fn rooted_at(config_dir: PathBuf) -> Self {
        let runtime_dir = std::env::temp_dir().join(format!(".{}", APP_DIRECTORY));
        Self {
            config_file: config_dir.join(CONFIG_FILENAME),
            log_file: runtime_dir.join(format!("{}.log", APP_DIRECTORY)),
            config_dir,
            runtime_dir,
        }
    }
}
