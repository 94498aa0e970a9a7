//! Command-line interface for skyguard.
//!
//! This module provides the CLI structure for the `skyguard` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CacheCommand, CheckCommand, ClassifyCommand, ConfigCommand, OutputFormat, PollutantArg,
    StationsCommand,
};

use crate::logging::Verbosity;

/// skyguard - Traffic-light air quality for schools
///
/// Fetches current PM2.5 readings near a location, adds a simulated
/// satellite ozone reading, and tells you whether outdoor activities are safe.
#[derive(Debug, Parser)]
#[command(name = "skyguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the air quality at a location
    Check(CheckCommand),

    /// Classify a concentration without fetching anything
    Classify(ClassifyCommand),

    /// List monitoring stations near a location
    Stations(StationsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage the response cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Location;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "skyguard");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["skyguard", "-q", "config", "path"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["skyguard", "config", "path"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["skyguard", "-v", "config", "path"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["skyguard", "-vvv", "config", "path"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_check_coordinates() {
        let cli = parse(&["skyguard", "check", "19.4326,-99.1332"]);
        let Command::Check(cmd) = cli.command else {
            panic!("expected check command");
        };
        assert!(cmd.location.coordinates().is_some());
        assert_eq!(cmd.format, OutputFormat::Plain);
        assert!(!cmd.ozone_alert);
        assert!(!cmd.no_cache);
        assert_eq!(cmd.radius_km, None);
    }

    #[test]
    fn test_parse_check_negative_latitude() {
        let cli = parse(&["skyguard", "check", "-0.1807,-78.4678"]);
        assert!(matches!(cli.command, Command::Check(_)));
    }

    #[test]
    fn test_parse_check_city_with_flags() {
        let cli = parse(&[
            "skyguard",
            "check",
            "Quito",
            "--ozone-alert",
            "--no-cache",
            "--radius-km",
            "10",
            "--format",
            "json",
        ]);
        let Command::Check(cmd) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(cmd.location, Location::City("Quito".to_string()));
        assert!(cmd.ozone_alert);
        assert!(cmd.no_cache);
        assert_eq!(cmd.radius_km, Some(10));
        assert_eq!(cmd.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_check_rejects_radius_out_of_range() {
        assert!(Cli::try_parse_from(["skyguard", "check", "Quito", "--radius-km", "30"]).is_err());
        assert!(Cli::try_parse_from(["skyguard", "check", "Quito", "--radius-km", "0"]).is_err());
    }

    #[test]
    fn test_parse_check_rejects_bad_coordinates() {
        assert!(Cli::try_parse_from(["skyguard", "check", "91,0"]).is_err());
    }

    #[test]
    fn test_parse_classify() {
        let cli = parse(&["skyguard", "classify", "pm25", "35.1"]);
        let Command::Classify(cmd) = cli.command else {
            panic!("expected classify command");
        };
        assert_eq!(cmd.pollutant, PollutantArg::Pm25);
        assert!((cmd.value - 35.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_classify_alias_and_negative() {
        let cli = parse(&["skyguard", "classify", "o3", "-4"]);
        let Command::Classify(cmd) = cli.command else {
            panic!("expected classify command");
        };
        assert_eq!(cmd.pollutant, PollutantArg::Ozone);
        assert!(cmd.value < 0.0);
    }

    #[test]
    fn test_parse_stations() {
        let cli = parse(&["skyguard", "stations", "19.43,-99.13", "-f", "json"]);
        assert!(matches!(cli.command, Command::Stations(_)));
    }

    #[test]
    fn test_parse_config_and_cache() {
        assert!(matches!(
            parse(&["skyguard", "config", "show", "--json"]).command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
        assert!(matches!(
            parse(&["skyguard", "cache", "prune", "--older-than", "60"]).command,
            Command::Cache(CacheCommand::Prune {
                older_than: Some(60)
            })
        ));
        assert!(matches!(
            parse(&["skyguard", "cache", "clear"]).command,
            Command::Cache(CacheCommand::Clear)
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["skyguard", "-c", "/custom/config.toml", "cache", "stats"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
