use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub network: NetworkConfig,
    pub stats: StatsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Hosted backend project.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// How many logs each screen pulls before aggregating.
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// "Week in Review" on the profile and friend screens
    pub week_window: usize,
    /// Statistics page history
    pub history_window: usize,
    /// Points on the statistics page trend line
    pub trend_points: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            week_window: 7,
            history_window: 30,
            trend_points: 7,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Overrides the default session file location
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let url = std::env::var("SUPABASE_URL")
            .context("SUPABASE_URL must be set (via .env file or environment variable)")?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .context("SUPABASE_ANON_KEY must be set (via .env file or environment variable)")?;

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shleepy");

        let builder = Self::defaults(&url, &anon_key)?
            // Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // Environment variables (SHLEEPY_STATS__WEEK_WINDOW=...)
            .add_source(Environment::with_prefix("SHLEEPY").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }

    /// Build from defaults plus an inline TOML document, without touching
    /// the environment or the filesystem.
    pub fn from_toml(url: &str, anon_key: &str, toml: &str) -> Result<Self> {
        let s = Self::defaults(url, anon_key)?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    fn defaults(
        url: &str,
        anon_key: &str,
    ) -> Result<config::ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            // Backend (loaded from environment above)
            .set_default("backend.url", url)?
            .set_default("backend.anon_key", anon_key)?
            // Network
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Stats
            .set_default("stats.week_window", 7)?
            .set_default("stats.history_window", 30)?
            .set_default("stats.trend_points", 7)
    }

    pub fn session_path(&self) -> PathBuf {
        self.session
            .path
            .clone()
            .unwrap_or_else(crate::session::SessionStore::default_path)
    }
}
