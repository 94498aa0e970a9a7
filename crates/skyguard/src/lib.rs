//! `skyguard` - Traffic-light air quality checks
//!
//! This library fetches current PM2.5 and ozone readings for a location,
//! classifies them as safe, caution, or unsafe, and turns the result into a
//! display payload with activity advice for schools.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aqi;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod present;
pub mod reading;

pub use cache::{CacheStats, ResponseCache};
pub use classify::{Assessment, Classification, Classifier, Level, Thresholds};
pub use config::Config;
pub use error::{Error, Result};
pub use fetch::{AirQualitySource, Fetcher};
pub use logging::init_logging;
pub use present::{DisplayPayload, Presenter};
pub use reading::{Coordinates, Location, Pollutant, Reading, Source};
