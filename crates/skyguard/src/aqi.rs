//! US EPA Air Quality Index conversions.
//!
//! WAQI reports pollutants as AQI sub-indices rather than concentrations, so
//! the fetcher converts them back with these tables. The presenter uses the
//! forward direction to show an AQI next to each concentration.

use crate::reading::Pollutant;

/// One linear segment of the AQI scale.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Breakpoint {
    c_low: f64,
    c_high: f64,
    i_low: u16,
    i_high: u16,
}

const fn bp(c_low: f64, c_high: f64, i_low: u16, i_high: u16) -> Breakpoint {
    Breakpoint {
        c_low,
        c_high,
        i_low,
        i_high,
    }
}

/// 24-hour PM2.5 breakpoints in µg/m³.
const PM25_BREAKPOINTS: &[Breakpoint] = &[
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 350.4, 301, 400),
    bp(350.5, 500.4, 401, 500),
];

/// 8-hour ozone breakpoints in ppb.
const OZONE_BREAKPOINTS: &[Breakpoint] = &[
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 70.0, 51, 100),
    bp(71.0, 85.0, 101, 150),
    bp(86.0, 105.0, 151, 200),
    bp(106.0, 200.0, 201, 300),
];

fn breakpoints(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::Pm25 => PM25_BREAKPOINTS,
        Pollutant::Ozone => OZONE_BREAKPOINTS,
    }
}

/// Absorbs binary rounding so that 12.1 does not truncate to 12.0.
const TRUNCATION_EPSILON: f64 = 1e-9;

/// EPA truncation before lookup: PM2.5 to one decimal, ozone to whole ppb.
fn truncate(pollutant: Pollutant, concentration: f64) -> f64 {
    match pollutant {
        Pollutant::Pm25 => (concentration * 10.0 + TRUNCATION_EPSILON).trunc() / 10.0,
        Pollutant::Ozone => (concentration + TRUNCATION_EPSILON).trunc(),
    }
}

/// Convert a concentration to its AQI value.
///
/// Values beyond the top of the table are reported as the table maximum.
/// Returns `None` for negative or non-finite input.
#[must_use]
pub fn concentration_to_aqi(pollutant: Pollutant, concentration: f64) -> Option<u16> {
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }
    let table = breakpoints(pollutant);
    let c = truncate(pollutant, concentration);

    // Gaps between bands (e.g. 12.0..12.1) fall into the upper band.
    let band = table
        .iter()
        .find(|b| c <= b.c_high)
        .or_else(|| table.last())?;

    if c > band.c_high {
        return Some(band.i_high);
    }

    let c = c.max(band.c_low);
    let slope = f64::from(band.i_high - band.i_low) / (band.c_high - band.c_low);
    let aqi = slope * (c - band.c_low) + f64::from(band.i_low);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(aqi.round() as u16)
}

/// Convert an AQI value back to a concentration.
///
/// AQI values above the table maximum are clamped to the top concentration.
#[must_use]
pub fn aqi_to_concentration(pollutant: Pollutant, aqi: f64) -> Option<f64> {
    if !aqi.is_finite() || aqi < 0.0 {
        return None;
    }
    let table = breakpoints(pollutant);
    let band = table
        .iter()
        .find(|b| aqi <= f64::from(b.i_high))
        .or_else(|| table.last())?;

    let aqi = aqi.clamp(f64::from(band.i_low), f64::from(band.i_high));
    let slope = (band.c_high - band.c_low) / f64::from(band.i_high - band.i_low);
    let concentration = slope * (aqi - f64::from(band.i_low)) + band.c_low;
    Some((concentration * 10.0).round() / 10.0)
}
