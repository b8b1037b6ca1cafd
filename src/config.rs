use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use crate::error::AppError;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";

/// Per-feed refresh intervals in milliseconds. Zero means fetch once.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RefreshIntervals {
    pub overview_ms: u64,
    pub positions_ms: u64,
    pub recent_trades_ms: u64,
    pub daily_stats_ms: u64,
    pub market_prices_ms: u64,
    pub performance_ms: u64,
    pub analytics_ms: u64,
    pub health_ms: u64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            overview_ms: 10_000,
            positions_ms: 10_000,
            recent_trades_ms: 15_000,
            daily_stats_ms: 120_000,
            market_prices_ms: 5_000,
            performance_ms: 10_000,
            analytics_ms: 30_000,
            health_ms: 30_000,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub log_level: String,
    /// Redraw period of the terminal dashboard.
    pub ui_update_ms: u64,
    pub daily_stats_days: u32,
    pub analytics_timeframe: String,
    pub refresh: RefreshIntervals,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 10_000,
            log_level: "info".to_string(),
            ui_update_ms: 1_000,
            daily_stats_days: 30,
            analytics_timeframe: "24h".to_string(),
            refresh: RefreshIntervals::default(),
        }
    }
}

impl Config {
    /// Loads settings from config.toml if present, then applies NEXT_PUBLIC_API_URL.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let mut config = match fs::read_to_string(path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Could not read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        config.apply_api_url_override(env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, AppError> {
        let config: Config = toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Could not parse config.toml: {}", e)))?;
        if config.api_base_url.trim().is_empty() {
            return Err(AppError::ConfigError("api_base_url must not be empty".to_string()));
        }
        Ok(config)
    }

    /// Empty or blank overrides are ignored.
    pub fn apply_api_url_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    pub fn get_log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ui_update_interval(&self) -> Duration {
        Duration::from_millis(self.ui_update_ms.max(100))
    }
}
