//! Core reading types for skyguard.
//!
//! This module defines the data structures for a single pollutant reading and
//! for the location it was requested for.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The pollutant a reading measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pollutant {
    /// Fine particulate matter (≤ 2.5 µm), in µg/m³.
    Pm25,
    /// Ground-level ozone, in ppb.
    Ozone,
}

impl Pollutant {
    /// Unit the concentration is expressed in.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Pm25 => "µg/m³",
            Self::Ozone => "ppb",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pm25 => "PM2.5",
            Self::Ozone => "Ozone",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pm25 => write!(f, "pm25"),
            Self::Ozone => write!(f, "ozone"),
        }
    }
}

impl FromStr for Pollutant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pm25" | "pm2.5" | "pm2_5" => Ok(Self::Pm25),
            "ozone" | "o3" => Ok(Self::Ozone),
            other => Err(Error::classification(format!(
                "unknown pollutant '{other}'"
            ))),
        }
    }
}

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Reported by a ground monitoring station.
    Measured,
    /// Produced by a simulator (satellite feed or fallback value).
    Simulated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured => write!(f, "measured"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// A single pollutant concentration at a point in time.
///
/// Readings are immutable once fetched; the constructor rejects values that
/// cannot be classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pollutant: Pollutant,
    concentration: f64,
    timestamp: DateTime<Utc>,
    source: Source,
    origin: String,
}

impl Reading {
    /// Create a new reading.
    ///
    /// # Errors
    ///
    /// Returns a classification error if the concentration is negative, NaN
    /// or infinite.
    pub fn new(
        pollutant: Pollutant,
        concentration: f64,
        timestamp: DateTime<Utc>,
        source: Source,
        origin: impl Into<String>,
    ) -> Result<Self> {
        if !concentration.is_finite() {
            return Err(Error::classification(format!(
                "{} concentration must be a finite number",
                pollutant.display_name()
            )));
        }
        if concentration < 0.0 {
            return Err(Error::classification(format!(
                "{} concentration cannot be negative ({concentration})",
                pollutant.display_name()
            )));
        }
        Ok(Self {
            pollutant,
            concentration,
            timestamp,
            source,
            origin: origin.into(),
        })
    }

    /// The measured pollutant.
    #[must_use]
    pub fn pollutant(&self) -> Pollutant {
        self.pollutant
    }

    /// Concentration in the pollutant's unit.
    #[must_use]
    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    /// When the value was observed.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the value was measured or simulated.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    /// Provider and station label, e.g. `OpenAQ • Belisario`.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether this reading was simulated.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.source == Source::Simulated
    }
}

/// A pair of geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

impl Coordinates {
    /// Create validated coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let input = format!("{latitude},{longitude}");
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidLocation {
                input,
                message: "latitude must be between -90 and 90".to_string(),
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidLocation {
                input,
                message: "longitude must be between -180 and 180".to_string(),
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// The place a check is run for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// A latitude/longitude pair.
    Coordinates(Coordinates),
    /// A city name, resolved by the data provider.
    City(String),
}

fn coordinate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:geo:)?\s*(-?\d+(?:\.\d+)?)\s*[,;]\s*(-?\d+(?:\.\d+)?)\s*$")
            .expect("coordinate pattern is valid")
    })
}

impl Location {
    /// Coordinates of this location, if it is not a city name.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Coordinates(coords) => Some(*coords),
            Self::City(_) => None,
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    /// Parse `"lat,lon"`, `"geo:lat;lon"`, or a city name.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLocation {
                input: s.to_string(),
                message: "location cannot be empty".to_string(),
            });
        }

        if let Some(caps) = coordinate_pattern().captures(trimmed) {
            let parse = |idx: usize| -> Result<f64> {
                caps[idx].parse().map_err(|_| Error::InvalidLocation {
                    input: s.to_string(),
                    message: format!("'{}' is not a number", &caps[idx]),
                })
            };
            let coords = Coordinates::new(parse(1)?, parse(2)?)?;
            return Ok(Self::Coordinates(coords));
        }

        if trimmed.chars().any(|c| c.is_ascii_digit()) && trimmed.contains(',') {
            return Err(Error::InvalidLocation {
                input: s.to_string(),
                message: "expected 'latitude,longitude' or a city name".to_string(),
            });
        }

        Ok(Self::City(trimmed.to_string()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates(coords) => write!(f, "{coords}"),
            Self::City(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm25(value: f64) -> Result<Reading> {
        Reading::new(Pollutant::Pm25, value, Utc::now(), Source::Measured, "test")
    }

    #[test]
    fn test_pollutant_display_and_unit() {
        assert_eq!(Pollutant::Pm25.to_string(), "pm25");
        assert_eq!(Pollutant::Ozone.to_string(), "ozone");
        assert_eq!(Pollutant::Pm25.unit(), "µg/m³");
        assert_eq!(Pollutant::Ozone.unit(), "ppb");
        assert_eq!(Pollutant::Pm25.display_name(), "PM2.5");
    }

    #[test]
    fn test_pollutant_from_str() {
        assert_eq!("pm25".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("PM2.5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("o3".parse::<Pollutant>().unwrap(), Pollutant::Ozone);
        assert!("no2".parse::<Pollutant>().is_err());
    }

    #[test]
    fn test_reading_new() {
        let reading = pm25(10.0).unwrap();
        assert_eq!(reading.pollutant(), Pollutant::Pm25);
        assert!((reading.concentration() - 10.0).abs() < f64::EPSILON);
        assert_eq!(reading.source(), Source::Measured);
        assert_eq!(reading.origin(), "test");
        assert!(!reading.is_simulated());
    }

    #[test]
    fn test_reading_zero_is_valid() {
        assert!(pm25(0.0).is_ok());
    }

    #[test]
    fn test_reading_rejects_negative() {
        let err = pm25(-0.1).unwrap_err();
        assert!(matches!(err, Error::Classification { .. }));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_reading_rejects_non_finite() {
        assert!(pm25(f64::NAN).is_err());
        assert!(pm25(f64::INFINITY).is_err());
    }

    #[test]
    fn test_reading_serialization() {
        let reading = Reading::new(
            Pollutant::Ozone,
            42.0,
            Utc::now(),
            Source::Simulated,
            "TEMPO (simulated)",
        )
        .unwrap();
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"pollutant\":\"ozone\""));
        assert!(json.contains("\"source\":\"simulated\""));
    }

    #[test]
    fn test_parse_location_coordinates() {
        let loc: Location = "19.4326,-99.1332".parse().unwrap();
        let coords = loc.coordinates().unwrap();
        assert!((coords.latitude - 19.4326).abs() < 1e-9);
        assert!((coords.longitude + 99.1332).abs() < 1e-9);
    }

    #[test]
    fn test_parse_location_geo_prefix() {
        let loc: Location = "geo:-2.1894;-79.8891".parse().unwrap();
        assert!(loc.coordinates().is_some());
    }

    #[test]
    fn test_parse_location_with_spaces() {
        let loc: Location = " 40.7128 , -74.0060 ".parse().unwrap();
        assert!(loc.coordinates().is_some());
    }

    #[test]
    fn test_parse_location_city() {
        let loc: Location = "Madrid".parse().unwrap();
        assert_eq!(loc, Location::City("Madrid".to_string()));
        assert!(loc.coordinates().is_none());
    }

    #[test]
    fn test_parse_location_out_of_range() {
        let err = "91.0,0".parse::<Location>().unwrap_err();
        assert!(err.to_string().contains("latitude"));

        let err = "0,181".parse::<Location>().unwrap_err();
        assert!(err.to_string().contains("longitude"));
    }

    #[test]
    fn test_parse_location_empty() {
        assert!("   ".parse::<Location>().is_err());
    }

    #[test]
    fn test_parse_location_garbled_coordinates() {
        assert!("12.5,abc".parse::<Location>().is_err());
    }

    #[test]
    fn test_location_display() {
        let loc: Location = "19.4326,-99.1332".parse().unwrap();
        assert_eq!(loc.to_string(), "19.4326, -99.1332");
        assert_eq!(Location::City("Quito".to_string()).to_string(), "Quito");
    }
}
