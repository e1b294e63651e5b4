//! Platform-specific directory management
//!
//! Environment variables can override default directories:
//! - `KOJICHAIN_CACHE_DIR` - Override cache directory (downloaded SRPMs)
//! - `KOJICHAIN_CONFIG_DIR` - Override config directory

use std::env;
use std::path::PathBuf;

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "KOJICHAIN_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "KOJICHAIN_CONFIG_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "kojichain";

const SRPMS_SUBDIR: &str = "srpms";

/// Directory provider for kojichain
#[derive(Debug, Clone)]
pub struct KojichainDirs {
    cache_dir: PathBuf,
    config_dir: PathBuf,
}

impl KojichainDirs {
    /// Resolve directories from the environment or platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: env::var_os(ENV_CACHE_DIR)
                .map_or_else(|| platform_dir(dirs::cache_dir(), ".cache"), PathBuf::from),
            config_dir: env::var_os(ENV_CONFIG_DIR)
                .map_or_else(|| platform_dir(dirs::config_dir(), ".config"), PathBuf::from),
        }
    }

    /// Cache directory
    ///
    /// - Linux: `$XDG_CACHE_HOME/kojichain` or `~/.cache/kojichain`
    /// - macOS: `~/Library/Caches/kojichain`
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Config directory
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Default location for fetched SRPMs
    #[must_use]
    pub fn srpm_dir(&self) -> PathBuf {
        self.cache_dir.join(SRPMS_SUBDIR)
    }

    /// `config.toml` in the config directory
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

impl Default for KojichainDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn platform_dir(base: Option<PathBuf>, home_fallback: &str) -> PathBuf {
    base.map(|p| p.join(APP_NAME)).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_fallback)
            .join(APP_NAME)
    })
}
