// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Holds XMPP credentials, identity store location and presence interval
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub xmpp: XmppConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct XmppConfig {
    /// host:port of the XMPP server
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for XmppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            username: String::new(),
            password: None,
        }
    }
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for XmppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmppConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the identity store database
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds between presence signals
    #[serde(default = "default_presence_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_presence_interval_secs(),
        }
    }
}

impl PresenceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_server() -> String {
    "talk.google.com:443".to_string()
}

fn default_store_path() -> String {
    "./chat_users".to_string()
}

fn default_presence_interval_secs() -> u64 {
    60
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    } else if path == "~" {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().to_string_lossy().to_string();
        }
        tracing::warn!("Failed to expand tilde: could not determine home directory");
    }
    path.to_string()
}

/// Split `host:port`. A missing port defaults to 5222.
pub fn split_server(server: &str) -> Result<(String, u16)> {
    match server.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                anyhow::bail!("Server address has no host: {}", server);
            }
            let port = port
                .parse()
                .with_context(|| format!("Invalid port in server address: {}", server))?;
            Ok((host.to_string(), port))
        }
        None if server.is_empty() => anyhow::bail!("Server address is empty"),
        None => Ok((server.to_string(), 5222)),
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. CHATTY_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory)
    /// 3. ~/.config/chatty/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("CHATTY_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from the first config file found, with environment
    /// variable overrides. No config file means defaults.
    pub fn load() -> Result<Self> {
        let config = match Self::find_config_file() {
            Some(path) => Self::read_file(&path)?,
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };
        config.finish()
    }

    /// Load an explicit config file, with environment variable overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_file(path.as_ref())?.finish()
    }

    fn read_file(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env_overrides()?;
        self.store.path = expand_tilde(&self.store.path);
        self.validate()?;
        Ok(self)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("CHATTY_SERVER") {
            self.xmpp.server = val;
        }
        if let Ok(val) = std::env::var("CHATTY_USERNAME") {
            self.xmpp.username = val;
        }
        if let Ok(val) = std::env::var("CHATTY_PASSWORD") {
            self.xmpp.password = Some(val);
            // Clear from environment to prevent exposure via /proc or ps
            std::env::remove_var("CHATTY_PASSWORD");
        }
        if let Ok(val) = std::env::var("CHATTY_STORE_PATH") {
            self.store.path = val;
        }
        if let Ok(val) = std::env::var("CHATTY_PRESENCE_INTERVAL_SECS") {
            self.presence.interval_secs = val.parse().with_context(|| {
                format!(
                    "CHATTY_PRESENCE_INTERVAL_SECS must be a valid number, got: {}",
                    val
                )
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.presence.interval_secs == 0 {
            anyhow::bail!("presence.interval_secs must be greater than zero");
        }
        if self.store.path.trim().is_empty() {
            anyhow::bail!("store.path cannot be empty");
        }
        Ok(())
    }

    /// True when both username and password are set; required to connect
    pub fn has_credentials(&self) -> bool {
        !self.xmpp.username.trim().is_empty()
            && self
                .xmpp
                .password
                .as_deref()
                .is_some_and(|p| !p.is_empty())
    }
}
