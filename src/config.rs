use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::utils::paths::{ensure_config_dir_exists, get_config_path};

pub const ENV_SERVER_URL: &str = "CLIPSYNC_SERVER_URL";
pub const ENV_USERNAME: &str = "CLIPSYNC_USERNAME";
pub const ENV_TOKEN: &str = "CLIPSYNC_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverMode {
    /// Long-lived WebSocket; falls back to polling if reconnects are exhausted
    Push,
    /// Short-interval HTTP polling
    Poll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Explicit push channel base URL; derived from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_detect_interval_ms")]
    pub detect_interval_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_receiver")]
    pub receiver: ReceiverMode,

    #[serde(default = "default_submit_initial")]
    pub submit_initial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Consecutive failed connects before giving up; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// A push session shorter than this counts as a failed attempt.
    #[serde(default = "default_min_session_secs")]
    pub min_session_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_detect_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_receiver() -> ReceiverMode {
    ReceiverMode::Push
}

fn default_submit_initial() -> bool {
    true
}

fn default_initial_backoff_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_min_session_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            push_url: None,
            username: String::new(),
            token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            detect_interval_ms: default_detect_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            receiver: default_receiver(),
            submit_initial: default_submit_initial(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_attempts: None,
            min_session_secs: default_min_session_secs(),
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = resolve_path(path)?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.is_empty()) {
            self.server.url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME).filter(|v| !v.is_empty()) {
            self.server.username = username;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.server.token = token;
        }
    }

    /// Checks everything the sync loop and backend calls rely on.
    pub fn validate(&self) -> Result<()> {
        if self.server.username.trim().is_empty() {
            bail!(
                "No username configured. Set [server].username in the config file or {}",
                ENV_USERNAME
            );
        }
        self.server.base_url()?;
        self.server.push_base_url()?;

        if self.sync.detect_interval_ms == 0 || self.sync.poll_interval_ms == 0 {
            bail!("Sync intervals must be greater than zero");
        }
        if self.reconnect.max_backoff_secs < self.reconnect.initial_backoff_secs {
            bail!("reconnect.max_backoff_secs must not be smaller than reconnect.initial_backoff_secs");
        }
        Ok(())
    }

    /// Copy safe to print: the token is masked.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if !config.server.token.is_empty() {
            config.server.token = "********".to_string();
        }
        config
    }

    /// Write the default config to `path` (or the default location) unless a file exists.
    pub fn write_default(path: Option<&Path>) -> Result<(PathBuf, bool)> {
        let config_path = resolve_path(path)?;
        if config_path.exists() {
            return Ok((config_path, false));
        }

        if path.is_none() {
            ensure_config_dir_exists()?;
        }
        let content = toml::to_string_pretty(&Config::default())?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok((config_path, true))
    }
}

pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => get_config_path(),
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid server URL '{}'", self.url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("Unsupported server URL scheme '{other}', expected http or https"),
        }
    }

    /// WebSocket base for the push channel: `push_url`, or `url` with http→ws / https→wss.
    pub fn push_base_url(&self) -> Result<Url> {
        if let Some(push_url) = &self.push_url {
            let url = Url::parse(push_url)
                .with_context(|| format!("Invalid push URL '{push_url}'"))?;
            return match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => bail!("Unsupported push URL scheme '{other}', expected ws or wss"),
            };
        }

        let mut url = self.base_url()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot derive push URL from '{}'", self.url))?;
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncSettings {
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://127.0.0.1:8000");
        assert_eq!(config.sync.detect_interval_ms, 1000);
        assert_eq!(config.sync.poll_interval_ms, 2000);
        assert_eq!(config.sync.receiver, ReceiverMode::Push);
        assert_eq!(config.reconnect.initial_backoff_secs, 5);
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("receiver = \"push\""));
        assert!(!toml_str.contains("max_attempts"));
    }

    #[test]
    fn test_config_deserialization_fills_defaults() {
        let toml_str = r#"
        [server]
        url = "https://clip.example.com"
        username = "alice"

        [sync]
        receiver = "poll"

        [reconnect]
        max_attempts = 3
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.url, "https://clip.example.com");
        assert_eq!(config.server.username, "alice");
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.sync.receiver, ReceiverMode::Poll);
        assert_eq!(config.sync.detect_interval_ms, 1000);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.max_backoff_secs, 60);
        assert_eq!(config.reconnect.min_session_secs, 10);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.username, "");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[server]\nusername = \"bob\"\ntoken = \"t0k\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.username, "bob");
        assert_eq!(config.server.token, "t0k");
    }

    #[test]
    fn test_load_from_invalid_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[server\nusername = ").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.server.username = "from-file".to_string();

        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SERVER_URL, "https://override.example.com"),
            (ENV_USERNAME, "from-env"),
            (ENV_TOKEN, ""),
        ]);
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.url, "https://override.example.com");
        assert_eq!(config.server.username, "from-env");
        assert_eq!(config.server.token, "");
    }

    #[test]
    fn test_validate_requires_username() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.username = "alice".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.server.username = "alice".to_string();
        config.reconnect.initial_backoff_secs = 30;
        config.reconnect.max_backoff_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_push_url_derived_from_server_url() {
        let mut server = ServerConfig::default();
        server.url = "https://clip.example.com/app".to_string();
        assert_eq!(
            server.push_base_url().unwrap().as_str(),
            "wss://clip.example.com/app"
        );

        server.url = "http://localhost:8000".to_string();
        assert_eq!(server.push_base_url().unwrap().as_str(), "ws://localhost:8000/");
    }

    #[test]
    fn test_explicit_push_url_must_be_websocket() {
        let mut server = ServerConfig::default();
        server.push_url = Some("http://push.example.com".to_string());
        assert!(server.push_base_url().is_err());

        server.push_url = Some("wss://push.example.com".to_string());
        assert_eq!(server.push_base_url().unwrap().scheme(), "wss");
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = Config::default();
        config.server.token = "secret".to_string();
        assert_eq!(config.redacted().server.token, "********");
        assert_eq!(config.server.token, "secret");
    }

    #[test]
    fn test_write_default_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let (written_path, created) = Config::write_default(Some(&path)).unwrap();
        assert!(created);
        assert_eq!(written_path, path);

        fs::write(&path, "[server]\nusername = \"keep\"\n").unwrap();
        let (_, created) = Config::write_default(Some(&path)).unwrap();
        assert!(!created);
        assert_eq!(Config::load_from(&path).unwrap().server.username, "keep");
    }
}
