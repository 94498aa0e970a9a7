//! Simulated satellite ozone feed.
//!
//! There is no live TEMPO integration; this source reports a fixed ozone
//! column so the rest of the pipeline can combine ground and satellite data.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::AirQualitySource;
use crate::config::SatelliteConfig;
use crate::error::Result;
use crate::reading::{Location, Pollutant, Reading, Source};

/// Origin label carried by every simulated satellite reading.
pub const SATELLITE_ORIGIN: &str = "TEMPO (simulated)";

/// Produces one simulated ozone reading per request.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteSimulator {
    baseline_ppb: f64,
    alert_ppb: f64,
    alert_active: bool,
}

impl SatelliteSimulator {
    /// Create a simulator reporting `baseline_ppb`, or `alert_ppb` once the
    /// alert is switched on.
    #[must_use]
    pub fn new(baseline_ppb: f64, alert_ppb: f64) -> Self {
        Self {
            baseline_ppb,
            alert_ppb,
            alert_active: false,
        }
    }

    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &SatelliteConfig) -> Self {
        Self::new(config.baseline_ozone_ppb, config.alert_ozone_ppb)
    }

    /// Switch the simulated ozone alert on or off.
    #[must_use]
    pub fn with_alert(mut self, active: bool) -> Self {
        self.alert_active = active;
        self
    }

    /// Whether the alert value is being reported.
    #[must_use]
    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    fn current_ppb(&self) -> f64 {
        if self.alert_active {
            self.alert_ppb
        } else {
            self.baseline_ppb
        }
    }
}

#[async_trait]
impl AirQualitySource for SatelliteSimulator {
    fn name(&self) -> &'static str {
        SATELLITE_ORIGIN
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<Reading>> {
        let ppb = self.current_ppb();
        debug!("Simulated satellite ozone for {}: {} ppb", location, ppb);
        let reading = Reading::new(
            Pollutant::Ozone,
            ppb,
            Utc::now(),
            Source::Simulated,
            SATELLITE_ORIGIN,
        )?;
        Ok(vec![reading])
    }
}
