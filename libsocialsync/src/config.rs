//! Configuration management for SocialSync

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
}

/// Publish engine tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of accounts published to at the same time
    pub max_concurrency: usize,
    /// Timeout for media uploads
    pub upload_timeout_secs: u64,
    /// Timeout for session, post and publish requests
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            upload_timeout_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Base URLs of the services the built-in adapters talk to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub bluesky_service: String,
    pub bluesky_app: String,
    pub threads_graph: String,
    pub threads_web: String,
    pub pixelfed_default_instance: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            bluesky_service: "https://bsky.social".to_string(),
            bluesky_app: "https://bsky.app".to_string(),
            threads_graph: "https://graph.threads.net/v1.0".to_string(),
            threads_web: "https://www.threads.net".to_string(),
            pixelfed_default_instance: "https://pixelfed.social".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountsConfig {
    pub path: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/socialsync/accounts.toml".to_string(),
        }
    }
}

impl AccountsConfig {
    /// The account file path with `~` and environment variables expanded
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.path).map_err(|e| {
            ConfigError::MissingField(format!("accounts.path ({}): {}", self.path, e))
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SOCIALSYNC_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialsync").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.engine.upload_timeout(), Duration::from_secs(60));
        assert_eq!(config.engine.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.endpoints.bluesky_service, "https://bsky.social");
        assert_eq!(
            config.endpoints.threads_graph,
            "https://graph.threads.net/v1.0"
        );
        assert_eq!(
            config.endpoints.pixelfed_default_instance,
            "https://pixelfed.social"
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[engine]
max_concurrency = 2

[endpoints]
bluesky_service = "http://127.0.0.1:9000"
"#,
        )
        .unwrap();

        assert_eq!(config.engine.max_concurrency, 2);
        assert_eq!(config.engine.upload_timeout_secs, 60);
        assert_eq!(config.endpoints.bluesky_service, "http://127.0.0.1:9000");
        assert_eq!(config.endpoints.bluesky_app, "https://bsky.app");
        assert_eq!(config.accounts, AccountsConfig::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_path_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine\nmax_concurrency = ").unwrap();

        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::SocialSyncError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/socialsync/config.toml"));
        assert!(matches!(
            result,
            Err(crate::SocialSyncError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("SOCIALSYNC_CONFIG", "/tmp/socialsync-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("SOCIALSYNC_CONFIG");
        assert_eq!(path, PathBuf::from("/tmp/socialsync-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_missing_default_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        std::env::set_var("SOCIALSYNC_CONFIG", path.to_string_lossy().to_string());
        let config = Config::load();
        std::env::remove_var("SOCIALSYNC_CONFIG");
        assert_eq!(config.unwrap(), Config::default());
    }

    #[test]
    fn test_accounts_path_expands_tilde() {
        let accounts = AccountsConfig {
            path: "/var/lib/socialsync/accounts.toml".to_string(),
        };
        assert_eq!(
            accounts.resolved_path().unwrap(),
            PathBuf::from("/var/lib/socialsync/accounts.toml")
        );

        let home = AccountsConfig::default().resolved_path().unwrap();
        assert!(!home.to_string_lossy().starts_with('~'));
    }
}
