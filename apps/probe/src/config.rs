//! Probe configuration.
//!
//! Read from `~/.config/halink/config.json`; environment variables and
//! command-line flags (both handled by clap) take precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use halink_connection::ConnectionConfig;
use halink_pool::{HubCredentials, PoolConfig};

const DEFAULT_USER_ID: &str = "probe";

/// On-disk shape of the config file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProbeConfigFile {
    #[serde(default)]
    hub_url: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    connect_timeout_secs: Option<u64>,
    #[serde(default)]
    command_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub hub_url: String,
    pub access_token: String,
    pub user_id: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            hub_url: String::new(),
            access_token: String::new(),
            user_id: DEFAULT_USER_ID.into(),
            connect_timeout: connection.connect_timeout,
            command_timeout: connection.command_timeout,
        }
    }
}

impl ProbeConfig {
    /// Loads `path`, or the default location when `None`. A missing file
    /// yields defaults; so does an unparsable one, with a warning.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };

        let mut config = ProbeConfig::default();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)?;
        let Ok(file) = serde_json::from_str::<ProbeConfigFile>(&content) else {
            tracing::warn!(path = %path.display(), "failed to parse config, using defaults");
            return Ok(config);
        };

        config.hub_url = file.hub_url;
        config.access_token = file.access_token;
        if !file.user_id.is_empty() {
            config.user_id = file.user_id;
        }
        if let Some(secs) = file.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.command_timeout_secs {
            config.command_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Replaces the hub address and token with any values given explicitly.
    pub fn apply_overrides(&mut self, hub_url: Option<String>, access_token: Option<String>) {
        if let Some(url) = hub_url {
            self.hub_url = url;
        }
        if let Some(token) = access_token {
            self.access_token = token;
        }
    }

    pub fn credentials(&self) -> anyhow::Result<HubCredentials> {
        if self.hub_url.is_empty() {
            anyhow::bail!("no hub URL configured (use --hub-url or HALINK_HUB_URL)");
        }
        if self.access_token.is_empty() {
            anyhow::bail!("no access token configured (use --token or HALINK_TOKEN)");
        }
        Ok(HubCredentials {
            hub_url: self.hub_url.clone(),
            access_token: self.access_token.clone(),
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            connection: ConnectionConfig {
                connect_timeout: self.connect_timeout,
                command_timeout: self.command_timeout,
                ..ConnectionConfig::default()
            },
            ..PoolConfig::default()
        }
    }
}

/// `~/.config/halink/config.json`.
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set, pass --config")?;
    Ok(PathBuf::from(home).join(".config").join("halink").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn default_location_is_under_home_config() {
        if std::env::var_os("HOME").is_some() {
            assert!(config_path().unwrap().ends_with(".config/halink/config.json"));
        }
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.user_id, "probe");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert!(config.credentials().is_err());
    }

    #[test]
    fn file_values_are_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "hub_url": "http://homeassistant.local:8123",
                "access_token": "abc",
                "user_id": "alice",
                "command_timeout_secs": 5
            }"#,
        );
        let config = ProbeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));

        let creds = config.credentials().unwrap();
        assert_eq!(creds.hub_url, "http://homeassistant.local:8123");
        assert_eq!(creds.access_token, "abc");
        assert_eq!(
            config.pool_config().connection.command_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{ not json");
        let config = ProbeConfig::load(Some(&path)).unwrap();
        assert!(config.hub_url.is_empty());
    }

    #[test]
    fn explicit_values_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"hub_url": "http://a:8123", "access_token": "file"}"#);
        let mut config = ProbeConfig::load(Some(&path)).unwrap();

        config.apply_overrides(Some("http://b:8123".into()), None);
        assert_eq!(config.hub_url, "http://b:8123");
        assert_eq!(config.access_token, "file");

        config.apply_overrides(None, Some("flag".into()));
        assert_eq!(config.access_token, "flag");
    }
}
