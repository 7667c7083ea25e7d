//! src/config.rs
//! ============================================================================
//! # Config: Client Configuration Loader and Saver
//!
//! All user-editable settings for the vault client, persisted as TOML at the
//! XDG-compliant config path via the [`directories`](https://docs.rs/directories)
//! crate. This file is also where the theme preference lives between runs.
//!
//! ## Features
//! - Cross-platform config discovery and writing (Linux, macOS, Windows)
//! - Robust defaulting if no config file exists
//! - `FILEVAULT_API_URL` environment override for the backend base URL
//! - Async load/save for smooth integration with Tokio

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use tokio::fs as TokioFs;

use crate::util::debounce::DebounceConfig;

/// Environment variable overriding the configured backend base URL.
pub const API_URL_ENV: &str = "FILEVAULT_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Color scheme preference, persisted across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,

    Dark,
}

/// Result-page cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached result pages.
    pub max_capacity: u64,

    /// Time-to-live for a page before a subscription refetches it.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Time-to-idle (evict if not accessed).
    #[serde(with = "humantime_serde")]
    pub tti: Duration,

    /// Enable hit/miss statistics.
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 256,
            ttl: Duration::from_secs(120),
            tti: Duration::from_secs(60),
            enable_stats: true,
        }
    }
}

/// Main configuration struct for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL; all operations are sub-paths of `{base}/files/`.
    pub api_base_url: String,

    pub theme: Theme,

    pub cache: CacheConfig,

    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Bound on every individual transport call.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Where downloads are saved; platform download dir when unset.
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            theme: Theme::default(),
            cache: CacheConfig::default(),
            debounce: DebounceConfig::default(),
            request_timeout: Duration::from_secs(30),
            download_dir: None,
        }
    }
}

impl Config {
    /// Loads config from the TOML file at the app config dir, or returns
    /// defaults (writing them out so the file exists for editing).
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/FileVault/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        let mut cfg: Self = if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            toml::from_str(&text)?
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;
            default_config
        };

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Saves config to the TOML file at the app config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "example", "FileVault")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            info!("Overriding api_base_url from {API_URL_ENV}");
            self.api_base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.api_base_url, DEFAULT_API_URL);
        assert_eq!(parsed.theme, Theme::Light);
        assert_eq!(parsed.cache.max_capacity, 256);
        assert_eq!(parsed.request_timeout, Duration::from_secs(30));
        assert_eq!(
            parsed.debounce.quiet_period,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_theme_serializes_lowercase() {
        let mut cfg = Config::default();
        cfg.theme = Theme::Dark;
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("theme = \"dark\""));
    }

    #[test]
    fn test_env_override_wins() {
        let mut cfg = Config::default();
        // SAFETY: test-local mutation; no other thread in this test touches env.
        unsafe { std::env::set_var(API_URL_ENV, "http://vault.internal/api") };
        cfg.apply_env_overrides();
        unsafe { std::env::remove_var(API_URL_ENV) };

        assert_eq!(cfg.api_base_url, "http://vault.internal/api");
    }
}
