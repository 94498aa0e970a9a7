//! CLI command definitions.
//!
//! This module defines the arguments of every subcommand.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::reading::{Location, Pollutant};

/// Parse a location argument, reporting errors in clap's format.
fn parse_location(s: &str) -> Result<Location, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// `lat,lon`, `geo:lat;lon`, or a city name
    #[arg(value_parser = parse_location, allow_hyphen_values = true)]
    pub location: Location,

    /// Station search radius in km (overrides the config)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=25))]
    pub radius_km: Option<u32>,

    /// Report the simulated satellite ozone alert value
    #[arg(long)]
    pub ozone_alert: bool,

    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Classify command arguments.
#[derive(Debug, Args)]
pub struct ClassifyCommand {
    /// Pollutant the value belongs to
    #[arg(value_enum)]
    pub pollutant: PollutantArg,

    /// Concentration (µg/m³ for PM2.5, ppb for ozone)
    #[arg(allow_negative_numbers = true)]
    pub value: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Stations command arguments.
#[derive(Debug, Args)]
pub struct StationsCommand {
    /// `lat,lon` or `geo:lat;lon`
    #[arg(value_parser = parse_location, allow_hyphen_values = true)]
    pub location: Location,

    /// Search radius in km (overrides the config)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=25))]
    pub radius_km: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Response cache commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete every cached response
    Clear,

    /// Delete cached responses older than the configured TTL
    Prune {
        /// Age limit in seconds instead of the TTL
        #[arg(long, value_name = "SECS")]
        older_than: Option<u64>,
    },
}

/// Pollutant argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PollutantArg {
    /// Fine particulate matter
    #[value(alias = "pm2.5")]
    Pm25,
    /// Ground-level ozone
    #[value(alias = "o3")]
    Ozone,
}

impl From<PollutantArg> for Pollutant {
    fn from(arg: PollutantArg) -> Self {
        match arg {
            PollutantArg::Pm25 => Self::Pm25,
            PollutantArg::Ozone => Self::Ozone,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
