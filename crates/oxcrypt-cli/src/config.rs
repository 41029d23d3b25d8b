//! Configuration file support.
//!
//! Reads `config.toml` from the platform config directory:
//! - macOS: `~/Library/Application Support/com.oxidized.oxcrypt/`
//! - Linux: `~/.config/oxcrypt/`
//!
//! `OXCRYPT_CONFIG_DIR` overrides the directory. A missing file means
//! defaults.
//!
//! ```toml
//! [mount]
//! provider = "bind"
//! mount_flags = "nosuid,nodev,noexec"
//! read_only = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "OXCRYPT_CONFIG_DIR";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub mount: MountDefaults,
}

/// Defaults for `oxcrypt mount`.
///
/// Only applied for features the chosen provider declares.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MountDefaults {
    /// Preferred provider id
    pub provider: Option<String>,
    pub mount_flags: Option<String>,
    pub read_only: Option<bool>,
    pub port: Option<u16>,
    pub volume_id: Option<String>,
    pub volume_name: Option<String>,
}

/// Directory holding the configuration file, if one can be determined.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("com", "oxidized", "oxcrypt").map(|d| d.config_dir().to_path_buf())
}

/// Load the configuration, falling back to defaults when there is none.
pub fn load() -> Result<Config> {
    match config_dir() {
        Some(dir) => load_from(&dir.join(CONFIG_FILE)),
        None => {
            tracing::debug!("No config directory on this platform, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load the configuration from `path`; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<Config> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}", path.display());
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_mount_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[mount]\nprovider = \"bind\"\nmount_flags = \"nosuid\"\nread_only = true\nport = 8080\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.mount.provider.as_deref(), Some("bind"));
        assert_eq!(config.mount.mount_flags.as_deref(), Some("nosuid"));
        assert_eq!(config.mount.read_only, Some(true));
        assert_eq!(config.mount.port, Some(8080));
        assert_eq!(config.mount.volume_id, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[mount]\nbackend = \"fuse\"\n").unwrap();

        let err = load_from(&path).unwrap_err();
        assert!(err.chain().any(|c| c.downcast_ref::<toml::de::Error>().is_some()));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[mount]\nport = 70000\n").unwrap();
        assert!(load_from(&path).is_err());
    }
}
