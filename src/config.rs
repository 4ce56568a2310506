use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Port of the local control server.
    pub port: u16,
    pub rules_dir: String,
    pub watch_rules: bool,
    /// Seconds to wait for the extension to answer a request.
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 58421,
            rules_dir: "./rules".to_string(),
            watch_rules: true,
            request_timeout_secs: 30,
            log_level: None,
        }
    }
}

impl Config {
    pub fn rules_path(&self) -> PathBuf {
        PathBuf::from(&self.rules_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| Error::Config("HOME is not set".to_string()))?;
    let path = PathBuf::from(home).join(".tab-resources");
    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Loads `~/.tab-resources/config.toml`, writing the defaults there first if
/// the file does not exist yet.
pub fn load_config() -> Result<Config> {
    let path = get_config_dir()?.join("config.toml");
    if !path.exists() {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, content)?;
        return Ok(config);
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "port = 9000\nwatch_rules = false\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.watch_rules);
        assert_eq!(config.rules_dir, "./rules");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn request_timeout_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 5\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "port = \"not a number\"").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("config.toml")));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("port = 58421"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
