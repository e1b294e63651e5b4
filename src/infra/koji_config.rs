//! Koji client configuration files
//!
//! Reads the `[koji]` section of `/etc/koji.conf` and `~/.koji/config`.
//! The first file that defines a key wins.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;

/// Connection values found in koji client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KojiClientConfig {
    /// Hub URL
    pub server: Option<String>,
    /// Web interface URL (`weburl`)
    pub web_url: Option<String>,
    /// Client certificate
    pub cert: Option<PathBuf>,
    /// Hub CA certificate
    pub serverca: Option<PathBuf>,
}

impl KojiClientConfig {
    /// Load from the standard locations
    pub fn load() -> Self {
        let paths: Vec<PathBuf> = defaults::KOJI_CONFIG_FILES
            .iter()
            .map(|p| expand_home(p))
            .collect();
        Self::load_from_paths(&paths)
    }

    /// Load from `paths`, earlier files taking precedence
    ///
    /// Missing or unreadable files are skipped.
    pub fn load_from_paths(paths: &[PathBuf]) -> Self {
        let mut config = Self::default();
        for path in paths {
            match fs::read_to_string(path) {
                Ok(content) => {
                    tracing::debug!("Reading koji config {}", path.display());
                    config.merge(Self::parse(&content));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not read {}: {e}", path.display()),
            }
        }
        config
    }

    /// Parse the `[koji]` section of an INI document
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut in_koji = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_koji = section.trim() == "koji";
                continue;
            }
            if !in_koji {
                continue;
            }
            // Whichever delimiter comes first separates the key
            let Some(at) = line.find(['=', ':']) else {
                continue;
            };
            let (key, value) = (&line[..at], line[at + 1..].trim());
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "server" => config.server = Some(value.to_string()),
                "weburl" => config.web_url = Some(value.to_string()),
                "cert" => config.cert = Some(expand_home(value)),
                "serverca" => config.serverca = Some(expand_home(value)),
                _ => {}
            }
        }
        config
    }

    /// Fill unset values from `other`
    fn merge(&mut self, other: Self) {
        self.server = self.server.take().or(other.server);
        self.web_url = self.web_url.take().or(other.web_url);
        self.cert = self.cert.take().or(other.cert);
        self.serverca = self.serverca.take().or(other.serverca);
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest)),
        None => Path::new(path).to_path_buf(),
    }
}
