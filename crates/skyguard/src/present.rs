//! Traffic-light presentation of classifications.
//!
//! The presenter turns an [`Assessment`] (or a fetch error) into a
//! [`DisplayPayload`]: a color, an icon, a headline, the recommendation, sport
//! and school advice, and a footer naming the data source. The payload renders
//! as plain text through `Display` and as JSON through serde.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::aqi::concentration_to_aqi;
use crate::classify::{Assessment, Classification, Classifier, Level, Thresholds};
use crate::config::Config;
use crate::error::Error;
use crate::fetch::{StationReport, SATELLITE_ORIGIN};
use crate::reading::{Pollutant, Source};

/// Faintest intensity, used at the bottom of each band.
pub const MIN_INTENSITY: f64 = 0.15;

/// Strongest intensity, reached at the top of each band.
pub const MAX_INTENSITY: f64 = 0.6;

/// Timestamp format used in every payload.
const TIME_FORMAT: &str = "%d/%m/%Y - %I:%M %p";

/// Traffic-light color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Light {
    /// Safe.
    Green,
    /// Caution.
    Yellow,
    /// Unsafe.
    Red,
    /// No usable data.
    Grey,
}

impl Light {
    /// Color for a level.
    #[must_use]
    pub fn for_level(level: Level) -> Self {
        match level {
            Level::Safe => Self::Green,
            Level::Caution => Self::Yellow,
            Level::Unsafe => Self::Red,
        }
    }

    /// Emoji shown next to the color.
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Green => "🟢",
            Self::Yellow => "🟡",
            Self::Red => "🔴",
            Self::Grey => "⚪",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Yellow => "Yellow",
            Self::Red => "Red",
            Self::Grey => "Grey",
        }
    }
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}

/// Whether the payload describes a result or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Readings were classified.
    Ok,
    /// Nothing could be classified.
    Error,
}

/// How strongly to tint a color, growing linearly through the level's band.
///
/// The top band saturates at the pollutant's ceiling.
#[must_use]
pub fn intensity(thresholds: &Thresholds, concentration: f64) -> f64 {
    let (low, high) = match thresholds.level_for(concentration) {
        Level::Safe => (0.0, thresholds.safe_max),
        Level::Caution => (thresholds.safe_max, thresholds.caution_max),
        Level::Unsafe => (thresholds.caution_max, thresholds.ceiling),
    };
    let fraction = if high > low {
        ((concentration.min(high) - low) / (high - low)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    MIN_INTENSITY + fraction * (MAX_INTENSITY - MIN_INTENSITY)
}

/// Format a timestamp in the display offset, e.g. `05/10/2024 - 09:00 AM`.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format(TIME_FORMAT).to_string()
}

/// One classified reading as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    /// Pollutant.
    pub pollutant: Pollutant,
    /// Concentration in `unit`.
    pub concentration: f64,
    /// Unit of the concentration.
    pub unit: &'static str,
    /// US EPA AQI for the concentration.
    pub aqi: Option<u16>,
    /// Classification level.
    pub level: Level,
    /// Traffic-light color.
    pub light: Light,
    /// Color intensity.
    pub intensity: f64,
    /// Measured or simulated.
    pub source: Source,
    /// Provider and station.
    pub origin: String,
    /// Observation time in the display offset.
    pub observed_at: String,
}

/// Advice for one sport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityAdvice {
    /// Sport name.
    pub activity: &'static str,
    /// Sport emoji.
    pub icon: &'static str,
    /// Color of the advice.
    pub light: Light,
    /// `OK`, `Take precautions`, or `Not recommended`.
    pub advice: &'static str,
}

/// Guidance for schools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchoolGuidance {
    /// Recess, sports and other outdoor activities.
    pub outdoor_activities: &'static str,
    /// Classroom ventilation.
    pub ventilation: &'static str,
    /// Students with asthma or other conditions.
    pub sensitive_groups: &'static str,
}

const ACTIVITIES: [(&str, &str); 3] = [
    ("Football", "⚽"),
    ("Athletics", "🏃"),
    ("Recreation", "🤸"),
];

fn activity_advice(level: Level) -> Vec<ActivityAdvice> {
    let advice = match level {
        Level::Safe => "OK",
        Level::Caution => "Take precautions",
        Level::Unsafe => "Not recommended",
    };
    ACTIVITIES
        .iter()
        .map(|&(activity, icon)| ActivityAdvice {
            activity,
            icon,
            light: Light::for_level(level),
            advice,
        })
        .collect()
}

fn school_guidance(level: Level) -> SchoolGuidance {
    match level {
        Level::Safe => SchoolGuidance {
            outdoor_activities: "Go ahead. A good day for recess and sports without restrictions.",
            ventilation: "Open classroom windows to let fresh air circulate.",
            sensitive_groups: "No health risks are expected.",
        },
        Level::Caution => SchoolGuidance {
            outdoor_activities: "Allowed, but reduce the intensity of prolonged exercise \
                                 such as long runs.",
            ventilation: "Ventilate classrooms, but watch for smells or haze outside.",
            sensitive_groups: "Students with asthma or respiratory problems may notice \
                               symptoms. Advise them to take it easy.",
        },
        Level::Unsafe => SchoolGuidance {
            outdoor_activities: "Avoid them. Cancel or postpone physical education and \
                                 outdoor events.",
            ventilation: "Keep classroom windows closed so pollution stays outside.",
            sensitive_groups: "All students are at risk, especially those with pre-existing \
                               conditions. Watch closely for coughing or difficulty breathing.",
        },
    }
}

/// Everything needed to show a result, in plain text or JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    /// Where the check was run.
    pub location: String,
    /// Result or failure.
    pub status: Status,
    /// Overall color.
    pub light: Light,
    /// Emoji for `light`.
    pub icon: &'static str,
    /// Color intensity of the deciding reading.
    pub intensity: f64,
    /// Short verdict, e.g. `🔴 Red (Unhealthy)`.
    pub headline: String,
    /// Main recommendation, or the error message.
    pub message: String,
    /// Classified readings, deciding reading first.
    pub readings: Vec<ReadingView>,
    /// Sport advice. Empty in the error state.
    pub activities: Vec<ActivityAdvice>,
    /// School guidance. Absent in the error state.
    pub guidance: Option<SchoolGuidance>,
    /// Source and update time.
    pub footer: String,
}

/// A nearby station as shown by the `stations` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationView {
    /// Station name.
    pub name: String,
    /// Distance from the query point in km.
    pub distance_km: Option<f64>,
    /// Classified PM2.5 reading, if the station has a fresh one.
    pub reading: Option<ReadingView>,
}

/// Builds display payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presenter {
    classifier: Classifier,
    offset: FixedOffset,
}

impl Presenter {
    /// Create a presenter showing times in `offset`.
    #[must_use]
    pub fn new(classifier: Classifier, offset: FixedOffset) -> Self {
        Self { classifier, offset }
    }

    /// Presenter matching the configured thresholds and display offset.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.classifier(), config.display_offset())
    }

    fn reading_view(&self, classification: &Classification) -> ReadingView {
        let reading = &classification.reading;
        let pollutant = reading.pollutant();
        ReadingView {
            pollutant,
            concentration: reading.concentration(),
            unit: pollutant.unit(),
            aqi: concentration_to_aqi(pollutant, reading.concentration()),
            level: classification.level,
            light: Light::for_level(classification.level),
            intensity: intensity(self.classifier.thresholds(pollutant), reading.concentration()),
            source: reading.source(),
            origin: reading.origin().to_string(),
            observed_at: format_timestamp(reading.timestamp(), self.offset),
        }
    }

    /// Payload for a single classification.
    #[must_use]
    pub fn present(&self, classification: &Classification) -> DisplayPayload {
        self.assessment(&Assessment {
            location: classification.reading.origin().to_string(),
            overall: classification.level,
            classifications: vec![classification.clone()],
        })
    }

    /// Payload for an assessment; the worst reading decides the color.
    ///
    /// An assessment without classifications yields the Grey no-data payload.
    #[must_use]
    pub fn assessment(&self, assessment: &Assessment) -> DisplayPayload {
        if assessment.classifications.is_empty() {
            return self.error(&assessment.location, &Error::no_data(&assessment.location));
        }
        let primary = assessment.primary();
        let light = Light::for_level(assessment.overall);
        let primary_view = self.reading_view(primary);

        let descriptor = match (assessment.overall, primary.reading.pollutant()) {
            (Level::Safe, _) => "Good",
            (Level::Caution, _) => "Moderate",
            (Level::Unsafe, Pollutant::Ozone) if primary.reading.origin() == SATELLITE_ORIGIN => {
                "TEMPO ozone"
            }
            (Level::Unsafe, Pollutant::Ozone) => "Ozone",
            (Level::Unsafe, Pollutant::Pm25) => "Unhealthy",
        };

        let mut readings = vec![primary_view.clone()];
        readings.extend(
            assessment
                .classifications
                .iter()
                .filter(|c| !std::ptr::eq(*c, primary))
                .map(|c| self.reading_view(c)),
        );

        DisplayPayload {
            location: assessment.location.clone(),
            status: Status::Ok,
            light,
            icon: light.icon(),
            intensity: primary_view.intensity,
            headline: format!("{light} ({descriptor})"),
            message: primary.recommendation.clone(),
            readings,
            activities: activity_advice(assessment.overall),
            guidance: Some(school_guidance(assessment.overall)),
            footer: self.footer(assessment),
        }
    }

    fn footer(&self, assessment: &Assessment) -> String {
        let main = assessment
            .for_pollutant(Pollutant::Pm25)
            .unwrap_or_else(|| assessment.primary());
        let reading = &main.reading;

        let mut footer = format!("Source: {}", reading.origin());
        if !reading.is_simulated() {
            footer.push_str(&format!(
                " • Last update: {} (UTC{})",
                format_timestamp(reading.timestamp(), self.offset),
                self.offset
            ));
        }
        if assessment.primary().reading.origin() == SATELLITE_ORIGIN
            && assessment.overall > Level::Safe
        {
            footer.push_str(" • Alert: driven by simulated TEMPO data");
        }
        footer
    }

    /// Grey payload for a failed check.
    #[must_use]
    pub fn error(&self, location: impl fmt::Display, error: &Error) -> DisplayPayload {
        let descriptor = if error.is_network_error() {
            "Offline"
        } else if error.is_no_data() {
            "No data"
        } else {
            "Error"
        };
        let light = Light::Grey;

        DisplayPayload {
            location: location.to_string(),
            status: Status::Error,
            light,
            icon: light.icon(),
            intensity: MIN_INTENSITY,
            headline: format!("{light} ({descriptor})"),
            message: error.to_string(),
            readings: Vec::new(),
            activities: Vec::new(),
            guidance: None,
            footer: "Source: unavailable".to_string(),
        }
    }

    /// Views for the `stations` command.
    #[must_use]
    pub fn stations(&self, reports: &[StationReport]) -> Vec<StationView> {
        reports
            .iter()
            .map(|report| StationView {
                name: report.station.name.clone(),
                distance_km: report.station.distance_m.map(|m| (m / 100.0).round() / 10.0),
                reading: report
                    .reading
                    .as_ref()
                    .map(|r| self.reading_view(&self.classifier.classify(r))),
            })
            .collect()
    }
}

impl fmt::Display for ReadingView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<6} {:>6.1} {}",
            self.light.icon(),
            self.pollutant.display_name(),
            self.concentration,
            self.unit
        )?;
        if let Some(aqi) = self.aqi {
            write!(f, " (AQI {aqi})")?;
        }
        write!(f, "  {}  {}  {}", self.source, self.observed_at, self.origin)
    }
}

impl fmt::Display for DisplayPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SkyGuard air quality: {}", self.location)?;
        writeln!(f, "{}", self.headline)?;
        match self.status {
            Status::Ok => writeln!(f, "Recommendation: {}", self.message)?,
            Status::Error => writeln!(f, "{}", self.message)?,
        }

        if !self.readings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Readings:")?;
            for reading in &self.readings {
                writeln!(f, "  {reading}")?;
            }
        }

        if !self.activities.is_empty() {
            writeln!(f)?;
            writeln!(f, "Sports:")?;
            for a in &self.activities {
                writeln!(f, "  {} {} {}: {}", a.light.icon(), a.icon, a.activity, a.advice)?;
            }
        }

        if let Some(guidance) = &self.guidance {
            writeln!(f)?;
            writeln!(f, "School guidance:")?;
            writeln!(f, "  Outdoor activities: {}", guidance.outdoor_activities)?;
            writeln!(f, "  Ventilation: {}", guidance.ventilation)?;
            writeln!(f, "  Sensitive groups: {}", guidance.sensitive_groups)?;
        }

        writeln!(f)?;
        write!(f, "{}", self.footer)
    }
}

impl fmt::Display for StationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let distance = self
            .distance_km
            .map_or_else(|| "   ?   ".to_string(), |km| format!("{km:>5.1} km"));
        match &self.reading {
            Some(r) => write!(
                f,
                "{} {distance}  {:>6.1} {}  {}  {}",
                r.light.icon(),
                r.concentration,
                r.unit,
                r.observed_at,
                self.name
            ),
            None => write!(
                f,
                "{} {distance}  {:>13}  {}",
                Light::Grey.icon(),
                "no recent data",
                self.name
            ),
        }
    }
}
