//! Configuration management for skyguard.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classify::{Classifier, Thresholds};
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the platform config/cache dirs.
const APP_DIR_NAME: &str = "skyguard";

/// Default cache database file name.
const CACHE_FILE_NAME: &str = "responses.db";

/// Largest search radius OpenAQ accepts, in kilometres.
const MAX_RADIUS_KM: u32 = 25;

/// Longest measurement window accepted (31 days).
const MAX_WINDOW_HOURS: u32 = 24 * 31;

/// Oldest measurement age accepted.
const MAX_AGE_DAYS: u32 = 365;

/// Upper bound on HTTP retries.
const MAX_RETRIES: u8 = 10;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SKYGUARD_`, sections split by `__`)
/// 2. TOML config file at `~/.config/skyguard/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data provider endpoints and HTTP behaviour.
    pub api: ApiConfig,
    /// Station search parameters.
    pub search: SearchConfig,
    /// Classification limits.
    pub thresholds: ThresholdConfig,
    /// Simulated satellite ozone feed.
    pub satellite: SatelliteConfig,
    /// Behaviour when no measured data is available.
    pub fallback: FallbackConfig,
    /// Presentation settings.
    pub display: DisplayConfig,
    /// HTTP response cache.
    pub cache: CacheConfig,
}

/// Data provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// OpenAQ v3 base URL.
    pub openaq_base_url: String,
    /// OpenAQ API key, sent as `X-API-Key`. OpenAQ is skipped when unset.
    pub openaq_api_key: Option<String>,
    /// WAQI base URL.
    pub waqi_base_url: String,
    /// WAQI token. WAQI is skipped when unset.
    pub waqi_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after a network error or 5xx response.
    pub max_retries: u8,
    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

/// Station search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search radius around the coordinates, 1 to 25 km.
    pub radius_km: u32,
    /// Maximum number of stations requested from OpenAQ.
    pub max_stations: u32,
    /// How far back to look for a station's latest measurement, in hours.
    pub measurement_window_hours: u32,
    /// Measurements older than this many days are ignored.
    pub max_age_days: u32,
}

/// Per-pollutant classification limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// PM2.5 limits in µg/m³.
    pub pm25: Thresholds,
    /// Ozone limits in ppb.
    pub ozone: Thresholds,
}

/// Simulated satellite feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    /// Append a simulated ozone reading to every check.
    pub enabled: bool,
    /// Ozone reported when no alert is active, in ppb.
    pub baseline_ozone_ppb: f64,
    /// Ozone reported while the ozone alert is active, in ppb.
    pub alert_ozone_ppb: f64,
}

/// Fallback configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Simulated PM2.5 value (µg/m³) used when every measured source fails.
    /// When unset, such a check ends in the error state instead.
    pub simulated_pm25: Option<f64>,
}

/// Presentation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Offset from UTC used to display measurement times, in hours.
    pub utc_offset_hours: i32,
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse recent API responses.
    pub enabled: bool,
    /// Path to the cache database.
    /// Defaults to `~/.cache/skyguard/responses.db`
    pub database_path: Option<PathBuf>,
    /// How long a cached response stays valid, in seconds.
    pub ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openaq_base_url: "https://api.openaq.org/v3".to_string(),
            openaq_api_key: None,
            waqi_base_url: "https://api.waqi.info".to_string(),
            waqi_token: None,
            timeout_secs: 20,
            max_retries: 2,
            retry_base_delay_ms: 500,
            user_agent: format!("SkyGuard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_km: 15,
            max_stations: 100,
            measurement_window_hours: 24,
            max_age_days: 7,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pm25: Thresholds::PM25,
            ozone: Thresholds::OZONE,
        }
    }
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            baseline_ozone_ppb: 38.0,
            alert_ozone_ppb: 85.0,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None, // Resolved at runtime
            ttl_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SKYGUARD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default cache directory path.
    #[must_use]
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (name, raw) in [
            ("openaq_base_url", &self.api.openaq_base_url),
            ("waqi_base_url", &self.api.waqi_base_url),
        ] {
            if Url::parse(raw).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("{name} is not a valid URL: {raw}"),
                });
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.api.max_retries > MAX_RETRIES {
            return Err(Error::ConfigValidation {
                message: format!(
                    "max_retries must be at most {MAX_RETRIES} (got {})",
                    self.api.max_retries
                ),
            });
        }

        if self.search.radius_km == 0 || self.search.radius_km > MAX_RADIUS_KM {
            return Err(Error::ConfigValidation {
                message: format!(
                    "radius_km must be between 1 and {MAX_RADIUS_KM} (got {})",
                    self.search.radius_km
                ),
            });
        }

        if self.search.max_stations == 0 || self.search.measurement_window_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "max_stations and measurement_window_hours must be greater than 0"
                    .to_string(),
            });
        }

        if self.search.measurement_window_hours > MAX_WINDOW_HOURS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "measurement_window_hours must be at most {MAX_WINDOW_HOURS} (got {})",
                    self.search.measurement_window_hours
                ),
            });
        }

        if self.search.max_age_days == 0 || self.search.max_age_days > MAX_AGE_DAYS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "max_age_days must be between 1 and {MAX_AGE_DAYS} (got {})",
                    self.search.max_age_days
                ),
            });
        }

        self.thresholds.pm25.validate("pm25")?;
        self.thresholds.ozone.validate("ozone")?;

        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !non_negative(self.satellite.baseline_ozone_ppb)
            || !non_negative(self.satellite.alert_ozone_ppb)
        {
            return Err(Error::ConfigValidation {
                message: "satellite ozone values must be non-negative".to_string(),
            });
        }

        if let Some(value) = self.fallback.simulated_pm25 {
            if !non_negative(value) {
                return Err(Error::ConfigValidation {
                    message: format!("simulated_pm25 must be non-negative (got {value})"),
                });
            }
        }

        if !(-12..=14).contains(&self.display.utc_offset_hours) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "utc_offset_hours must be between -12 and 14 (got {})",
                    self.display.utc_offset_hours
                ),
            });
        }

        Ok(())
    }

    /// Get the cache database path, resolving defaults if not set.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_cache_dir().join(CACHE_FILE_NAME))
    }

    /// Get the cache TTL as a Duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Get the display time zone.
    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.display.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Copy of the configuration with credentials masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| "***".to_string());
        let mut shown = self.clone();
        shown.api.openaq_api_key = mask(&self.api.openaq_api_key);
        shown.api.waqi_token = mask(&self.api.waqi_token);
        shown
    }

    /// Build the classifier described by the thresholds section.
    #[must_use]
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.thresholds.pm25, self.thresholds.ozone)
    }
}
