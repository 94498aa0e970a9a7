//! Retrieval of readings from external air-quality APIs.
//!
//! Measured sources are tried in order until one yields a PM2.5 reading. The
//! simulated satellite feed is queried afterwards and its ozone reading is
//! appended to whatever the measured source returned.

pub mod http;
pub mod openaq;
pub mod satellite;
pub mod waqi;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::reading::{Location, Pollutant, Reading, Source};

pub use http::{ApiRequest, CachedBackend, HttpBackend, ReqwestBackend};
pub use openaq::{OpenAqSource, Station, StationReport};
pub use satellite::{SatelliteSimulator, SATELLITE_ORIGIN};
pub use waqi::WaqiSource;

/// Origin label of the configured fallback reading.
pub const FALLBACK_ORIGIN: &str = "Simulated fallback";

/// A provider of readings for a location.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Fetch the current readings for `location`.
    ///
    /// # Errors
    ///
    /// Returns a network error if the provider cannot be reached and a
    /// no-data error if it has nothing for the location.
    async fn fetch(&self, location: &Location) -> Result<Vec<Reading>>;
}

/// Append path segments to a base URL, keeping any path the base already has.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::internal(format!("'{base}' cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::ConfigValidation {
        message: format!("invalid base URL '{raw}': {e}"),
    })
}

/// Create the HTTP backend described by `config`.
///
/// With `use_cache` the backend is wrapped in the response cache, unless the
/// cache is disabled or cannot be opened, in which case requests go straight
/// to the network.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_backend(config: &Config, use_cache: bool) -> Result<Arc<dyn HttpBackend>> {
    let http = ReqwestBackend::new(&config.api)?;

    if use_cache && config.cache.enabled {
        match ResponseCache::open(config.cache_path()) {
            Ok(cache) => {
                debug!("Using response cache at {}", cache.path().display());
                return Ok(Arc::new(CachedBackend::new(http, cache, config.cache_ttl())));
            }
            Err(e) => warn!("Response cache unavailable, continuing without it: {}", e),
        }
    }

    Ok(Arc::new(http))
}

/// Composite fetcher over the measured sources and the satellite feed.
#[derive(Default)]
pub struct Fetcher {
    measured: Vec<Box<dyn AirQualitySource>>,
    satellite: Option<SatelliteSimulator>,
    fallback_pm25: Option<f64>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("measured", &self.source_names())
            .field("satellite", &self.satellite)
            .field("fallback_pm25", &self.fallback_pm25)
            .finish()
    }
}

impl Fetcher {
    /// A fetcher with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measured source, tried after those already added.
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn AirQualitySource>) -> Self {
        self.measured.push(source);
        self
    }

    /// Append the simulator's ozone reading to every successful fetch.
    #[must_use]
    pub fn with_satellite(mut self, satellite: SatelliteSimulator) -> Self {
        self.satellite = Some(satellite);
        self
    }

    /// PM2.5 value to report when every measured source fails.
    #[must_use]
    pub fn with_fallback(mut self, pm25: Option<f64>) -> Self {
        self.fallback_pm25 = pm25;
        self
    }

    /// Build the standard pipeline: OpenAQ, then WAQI, plus the satellite feed.
    ///
    /// Providers without credentials are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured base URL is invalid.
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn HttpBackend>,
        ozone_alert: bool,
    ) -> Result<Self> {
        let mut fetcher = Self::new().with_fallback(config.fallback.simulated_pm25);

        match &config.api.openaq_api_key {
            Some(key) => {
                let source = OpenAqSource::new(
                    Arc::clone(&backend),
                    parse_base_url(&config.api.openaq_base_url)?,
                    Some(key.clone()),
                )
                .with_search(&config.search);
                fetcher = fetcher.with_source(Box::new(source));
            }
            None => info!("OpenAQ API key not configured, skipping OpenAQ"),
        }

        match &config.api.waqi_token {
            Some(token) => {
                let source = WaqiSource::new(
                    Arc::clone(&backend),
                    parse_base_url(&config.api.waqi_base_url)?,
                    token.clone(),
                );
                fetcher = fetcher.with_source(Box::new(source));
            }
            None => info!("WAQI token not configured, skipping WAQI"),
        }

        if config.satellite.enabled {
            let satellite =
                SatelliteSimulator::from_config(&config.satellite).with_alert(ozone_alert);
            fetcher = fetcher.with_satellite(satellite);
        }

        Ok(fetcher)
    }

    /// Names of the measured sources in the order they are tried.
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.measured.iter().map(|s| s.name()).collect()
    }

    /// Fetch readings for `location`.
    ///
    /// # Errors
    ///
    /// When no measured source yields PM2.5 and no fallback is configured,
    /// returns the first network error encountered, or a no-data error if
    /// every source was reachable.
    pub async fn fetch(&self, location: &Location) -> Result<Vec<Reading>> {
        let mut failures: Vec<Error> = Vec::new();
        let mut measured: Option<Vec<Reading>> = None;

        if self.measured.is_empty() {
            warn!("No measured data sources configured");
        }

        for source in &self.measured {
            match source.fetch(location).await {
                Ok(readings) if readings.iter().any(|r| r.pollutant() == Pollutant::Pm25) => {
                    info!("Using {} data for {}", source.name(), location);
                    measured = Some(readings);
                    break;
                }
                Ok(_) => {
                    warn!("{} returned no PM2.5 for {}", source.name(), location);
                    failures.push(Error::no_data(location));
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", source.name(), location, e);
                    failures.push(e);
                }
            }
        }

        let mut readings = match (measured, self.fallback_pm25) {
            (Some(readings), _) => readings,
            (None, Some(value)) => {
                warn!(
                    "No measured PM2.5 for {}, using simulated {} {}",
                    location,
                    value,
                    Pollutant::Pm25.unit()
                );
                vec![Reading::new(
                    Pollutant::Pm25,
                    value,
                    Utc::now(),
                    Source::Simulated,
                    FALLBACK_ORIGIN,
                )?]
            }
            (None, None) => {
                return Err(failures
                    .into_iter()
                    .find(Error::is_network_error)
                    .unwrap_or_else(|| Error::no_data(location)));
            }
        };

        if let Some(satellite) = &self.satellite {
            readings.extend(satellite.fetch(location).await?);
        }

        Ok(readings)
    }
}
