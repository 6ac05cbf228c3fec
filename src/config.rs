use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, OptionExt, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::DEFAULT_SCOPES;
use crate::history::client::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spotify application client id
    pub client_id: String,
    /// Must match a redirect URI registered for the application
    pub redirect_uri: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    /// Human readable duration, e.g. `10s` or `1m 30s`
    #[serde(default = "default_request_timeout")]
    request_timeout: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> String {
    humantime::format_duration(DEFAULT_TIMEOUT).to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            api_base_url: default_api_base_url(),
            request_timeout: default_request_timeout(),
            scopes: default_scopes(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("spotify-history").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or_eyre("No config directory found")?;

        Self::from_file(&config_path)
    }

    /// Write a default config file unless one already exists. Returns the path.
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory found")?;
        Self::default().write_if_missing(&path)?;
        Ok(path)
    }

    fn write_if_missing(&self, path: &Path) -> Result<()> {
        if path.exists() {
            log::info!("Config file already exists at {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn api_base_url(&self) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        // `Url::join` drops the last path segment without it
        if !url.ends_with('/') {
            url.push('/');
        }
        Url::parse(&url).wrap_err_with(|| format!("Invalid api_base_url: {}", self.api_base_url))
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout)
            .wrap_err_with(|| format!("Invalid request_timeout: {}", self.request_timeout))
    }
}
