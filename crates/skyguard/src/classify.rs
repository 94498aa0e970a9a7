//! Traffic-light classification of pollutant readings.
//!
//! Classification is a pure function of a reading and the configured
//! thresholds: each band's upper bound is inclusive, so a PM2.5 reading of
//! exactly 12.0 µg/m³ is still safe while 12.1 is not.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reading::{Pollutant, Reading};

/// Health level of a reading, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Normal activities.
    Safe,
    /// Reduce exertion; sensitive groups may notice symptoms.
    Caution,
    /// Avoid outdoor activities.
    Unsafe,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Caution => write!(f, "caution"),
            Self::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// Band limits for one pollutant, in the pollutant's unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Highest concentration still classified as safe.
    pub safe_max: f64,
    /// Highest concentration still classified as caution.
    pub caution_max: f64,
    /// Concentration at which the unsafe indicator reaches full intensity.
    pub ceiling: f64,
}

impl Thresholds {
    /// Default PM2.5 limits in µg/m³.
    pub const PM25: Self = Self {
        safe_max: 12.0,
        caution_max: 35.0,
        ceiling: 150.0,
    };

    /// Default ozone limits in ppb.
    pub const OZONE: Self = Self {
        safe_max: 54.0,
        caution_max: 70.0,
        ceiling: 200.0,
    };

    /// Level for a concentration.
    #[must_use]
    pub fn level_for(&self, concentration: f64) -> Level {
        if concentration <= self.safe_max {
            Level::Safe
        } else if concentration <= self.caution_max {
            Level::Caution
        } else {
            Level::Unsafe
        }
    }

    /// Check that the bands are ordered and non-negative.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `label` if the bands are inconsistent.
    pub fn validate(&self, label: &str) -> Result<()> {
        let ordered = self.safe_max >= 0.0
            && self.safe_max < self.caution_max
            && self.caution_max < self.ceiling;
        if ordered {
            Ok(())
        } else {
            Err(Error::ConfigValidation {
                message: format!(
                    "{label} thresholds need 0 <= safe_max ({}) < caution_max ({}) < ceiling ({})",
                    self.safe_max, self.caution_max, self.ceiling
                ),
            })
        }
    }
}

/// The traffic-light verdict for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Severity level.
    pub level: Level,
    /// The reading that was classified.
    pub reading: Reading,
    /// What to do about it.
    pub recommendation: String,
}

/// Recommendation text for a level.
#[must_use]
pub fn recommendation(pollutant: Pollutant, level: Level) -> &'static str {
    match (pollutant, level) {
        (_, Level::Safe) => "Normal activities",
        (_, Level::Caution) => "Reduce physical exertion",
        (Pollutant::Ozone, Level::Unsafe) => "Elevated ozone: avoid outdoor activities",
        (Pollutant::Pm25, Level::Unsafe) => "Avoid outdoor activities",
    }
}

/// Classifies readings against per-pollutant thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    pm25: Thresholds,
    ozone: Thresholds,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Thresholds::PM25, Thresholds::OZONE)
    }
}

impl Classifier {
    /// Create a classifier with the given limits.
    #[must_use]
    pub fn new(pm25: Thresholds, ozone: Thresholds) -> Self {
        Self { pm25, ozone }
    }

    /// Limits used for a pollutant.
    #[must_use]
    pub fn thresholds(&self, pollutant: Pollutant) -> &Thresholds {
        match pollutant {
            Pollutant::Pm25 => &self.pm25,
            Pollutant::Ozone => &self.ozone,
        }
    }

    /// Classify a reading.
    #[must_use]
    pub fn classify(&self, reading: &Reading) -> Classification {
        let level = self
            .thresholds(reading.pollutant())
            .level_for(reading.concentration());
        Classification {
            level,
            reading: reading.clone(),
            recommendation: recommendation(reading.pollutant(), level).to_string(),
        }
    }

    /// Classify every reading for a location and fold them into an assessment.
    ///
    /// # Errors
    ///
    /// Returns a no-data error if `readings` is empty.
    pub fn assess(&self, location: impl fmt::Display, readings: &[Reading]) -> Result<Assessment> {
        if readings.is_empty() {
            return Err(Error::no_data(location));
        }
        let classifications: Vec<Classification> =
            readings.iter().map(|r| self.classify(r)).collect();
        let overall = classifications
            .iter()
            .map(|c| c.level)
            .max()
            .unwrap_or(Level::Safe);
        Ok(Assessment {
            location: location.to_string(),
            overall,
            classifications,
        })
    }
}

/// All classifications for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// The location as displayed to the user.
    pub location: String,
    /// Worst level among all classifications.
    pub overall: Level,
    /// One entry per reading, in fetch order.
    pub classifications: Vec<Classification>,
}

impl Assessment {
    /// The classification that decides the overall level.
    ///
    /// On ties the earliest reading wins, which keeps the measured PM2.5 value
    /// ahead of simulated ozone.
    ///
    /// # Panics
    ///
    /// Panics if the assessment has no classifications. Assessments built by
    /// [`Classifier::assess`] always have at least one.
    #[must_use]
    pub fn primary(&self) -> &Classification {
        self.classifications
            .iter()
            .find(|c| c.level == self.overall)
            .unwrap_or(&self.classifications[0])
    }

    /// The first classification for a pollutant, if any.
    #[must_use]
    pub fn for_pollutant(&self, pollutant: Pollutant) -> Option<&Classification> {
        self.classifications
            .iter()
            .find(|c| c.reading.pollutant() == pollutant)
    }

    /// Whether any reading in this assessment was simulated.
    #[must_use]
    pub fn uses_simulated_data(&self) -> bool {
        self.classifications.iter().any(|c| c.reading.is_simulated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Source;
    use chrono::{TimeZone, Utc};

    fn reading(pollutant: Pollutant, value: f64) -> Reading {
        let ts = Utc.with_ymd_and_hms(2024, 10, 5, 14, 0, 0).unwrap();
        Reading::new(pollutant, value, ts, Source::Measured, "test").unwrap()
    }

    fn level(pollutant: Pollutant, value: f64) -> Level {
        Classifier::default().classify(&reading(pollutant, value)).level
    }

    #[test]
    fn test_pm25_examples() {
        assert_eq!(level(Pollutant::Pm25, 10.0), Level::Safe);
        assert_eq!(level(Pollutant::Pm25, 40.0), Level::Unsafe);
    }

    #[test]
    fn test_pm25_boundaries() {
        assert_eq!(level(Pollutant::Pm25, 0.0), Level::Safe);
        assert_eq!(level(Pollutant::Pm25, 12.0), Level::Safe);
        assert_eq!(level(Pollutant::Pm25, 12.1), Level::Caution);
        assert_eq!(level(Pollutant::Pm25, 35.0), Level::Caution);
        assert_eq!(level(Pollutant::Pm25, 35.1), Level::Unsafe);
    }

    #[test]
    fn test_ozone_boundaries() {
        assert_eq!(level(Pollutant::Ozone, 54.0), Level::Safe);
        assert_eq!(level(Pollutant::Ozone, 55.0), Level::Caution);
        assert_eq!(level(Pollutant::Ozone, 70.0), Level::Caution);
        assert_eq!(level(Pollutant::Ozone, 71.0), Level::Unsafe);
    }

    #[test]
    fn test_every_value_in_band_gets_band_level() {
        for tenth in 0..=120 {
            assert_eq!(level(Pollutant::Pm25, f64::from(tenth) / 10.0), Level::Safe);
        }
        for tenth in 121..=350 {
            assert_eq!(
                level(Pollutant::Pm25, f64::from(tenth) / 10.0),
                Level::Caution
            );
        }
        for tenth in 351..=1000 {
            assert_eq!(
                level(Pollutant::Pm25, f64::from(tenth) / 10.0),
                Level::Unsafe
            );
        }
    }

    #[test]
    fn test_classification_is_pure() {
        let classifier = Classifier::default();
        let r = reading(Pollutant::Pm25, 20.0);
        assert_eq!(classifier.classify(&r), classifier.classify(&r.clone()));
    }

    #[test]
    fn test_recommendations() {
        let classifier = Classifier::default();
        let safe = classifier.classify(&reading(Pollutant::Pm25, 5.0));
        assert_eq!(safe.recommendation, "Normal activities");

        let caution = classifier.classify(&reading(Pollutant::Pm25, 20.0));
        assert_eq!(caution.recommendation, "Reduce physical exertion");

        let unsafe_pm = classifier.classify(&reading(Pollutant::Pm25, 80.0));
        assert_eq!(unsafe_pm.recommendation, "Avoid outdoor activities");

        let unsafe_o3 = classifier.classify(&reading(Pollutant::Ozone, 90.0));
        assert!(unsafe_o3.recommendation.contains("ozone"));
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = Thresholds {
            safe_max: 5.0,
            caution_max: 15.0,
            ceiling: 100.0,
        };
        let classifier = Classifier::new(strict, Thresholds::OZONE);
        let c = classifier.classify(&reading(Pollutant::Pm25, 10.0));
        assert_eq!(c.level, Level::Caution);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Thresholds::PM25.validate("pm25").is_ok());
        assert!(Thresholds::OZONE.validate("ozone").is_ok());

        let inverted = Thresholds {
            safe_max: 40.0,
            caution_max: 35.0,
            ceiling: 150.0,
        };
        let err = inverted.validate("pm25").unwrap_err();
        assert!(err.to_string().contains("pm25"));

        let negative = Thresholds {
            safe_max: -1.0,
            caution_max: 35.0,
            ceiling: 150.0,
        };
        assert!(negative.validate("pm25").is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Safe < Level::Caution);
        assert!(Level::Caution < Level::Unsafe);
        assert_eq!(Level::Unsafe.to_string(), "unsafe");
    }

    #[test]
    fn test_assess_takes_worst_level() {
        let readings = vec![
            reading(Pollutant::Pm25, 8.0),
            reading(Pollutant::Ozone, 85.0),
        ];
        let assessment = Classifier::default().assess("Quito", &readings).unwrap();
        assert_eq!(assessment.overall, Level::Unsafe);
        assert_eq!(assessment.primary().reading.pollutant(), Pollutant::Ozone);
        assert_eq!(assessment.classifications.len(), 2);
    }

    #[test]
    fn test_assess_tie_prefers_first() {
        let readings = vec![
            reading(Pollutant::Pm25, 20.0),
            reading(Pollutant::Ozone, 60.0),
        ];
        let assessment = Classifier::default().assess("x", &readings).unwrap();
        assert_eq!(assessment.overall, Level::Caution);
        assert_eq!(assessment.primary().reading.pollutant(), Pollutant::Pm25);
    }

    #[test]
    fn test_assess_empty_is_no_data() {
        let err = Classifier::default().assess("Nowhere", &[]).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_for_pollutant_and_simulated() {
        let simulated = Reading::new(
            Pollutant::Ozone,
            30.0,
            Utc::now(),
            Source::Simulated,
            "TEMPO (simulated)",
        )
        .unwrap();
        let readings = vec![reading(Pollutant::Pm25, 8.0), simulated];
        let assessment = Classifier::default().assess("x", &readings).unwrap();
        assert!(assessment.for_pollutant(Pollutant::Ozone).is_some());
        assert!(assessment.uses_simulated_data());
    }
}
