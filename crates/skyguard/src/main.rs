//! `skyguard` - CLI for the skyguard air-quality checker
//!
//! This binary fetches readings, classifies them, and prints the traffic-light
//! result as plain text or JSON.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};

use skyguard::cache::ResponseCache;
use skyguard::cli::{
    CacheCommand, CheckCommand, ClassifyCommand, Cli, Command, ConfigCommand, OutputFormat,
    StationsCommand,
};
use skyguard::fetch::{build_backend, Fetcher, OpenAqSource};
use skyguard::present::Presenter;
use skyguard::{init_logging, Config, Error, Reading, Source};

type CmdResult = Result<ExitCode, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CmdResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;
    debug!("Configuration loaded");

    // Execute the command
    match cli.command {
        Command::Check(cmd) => handle_check(config, &cmd).await,
        Command::Classify(cmd) => handle_classify(&config, &cmd),
        Command::Stations(cmd) => handle_stations(config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Cache(cmd) => handle_cache(&config, cmd),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn handle_check(mut config: Config, cmd: &CheckCommand) -> CmdResult {
    if let Some(radius) = cmd.radius_km {
        config.search.radius_km = radius;
    }
    let presenter = Presenter::from_config(&config);
    let backend = build_backend(&config, !cmd.no_cache)?;
    let fetcher = Fetcher::from_config(&config, backend, cmd.ozone_alert)?;
    debug!("Fetching with {:?}", fetcher);

    let outcome = match fetcher.fetch(&cmd.location).await {
        Ok(readings) => config.classifier().assess(&cmd.location, &readings),
        Err(e) => Err(e),
    };

    let (payload, ok) = match outcome {
        Ok(assessment) => (presenter.assessment(&assessment), true),
        Err(e) => {
            error!("Check for {} failed: {}", cmd.location, e);
            (presenter.error(&cmd.location, &e), false)
        }
    };

    match cmd.format {
        OutputFormat::Plain => println!("{payload}"),
        OutputFormat::Json => print_json(&payload)?,
    }
    Ok(exit_code(ok))
}

fn handle_classify(config: &Config, cmd: &ClassifyCommand) -> CmdResult {
    let presenter = Presenter::from_config(config);
    let origin = "Manual input";

    let result = Reading::new(
        cmd.pollutant.into(),
        cmd.value,
        Utc::now(),
        Source::Measured,
        origin,
    );
    let (payload, ok) = match result {
        Ok(reading) => (presenter.present(&config.classifier().classify(&reading)), true),
        Err(e) => (presenter.error(origin, &e), false),
    };

    match cmd.format {
        OutputFormat::Plain => println!("{payload}"),
        OutputFormat::Json => print_json(&payload)?,
    }
    Ok(exit_code(ok))
}

async fn handle_stations(mut config: Config, cmd: &StationsCommand) -> CmdResult {
    if let Some(radius) = cmd.radius_km {
        config.search.radius_km = radius;
    }
    let Some(coords) = cmd.location.coordinates() else {
        return Err(Error::InvalidLocation {
            input: cmd.location.to_string(),
            message: "station search needs coordinates".to_string(),
        }
        .into());
    };
    let Some(api_key) = config.api.openaq_api_key.clone() else {
        return Err(Error::ConfigValidation {
            message: "api.openaq_api_key is required to list stations".to_string(),
        }
        .into());
    };

    let backend = build_backend(&config, true)?;
    let base_url = url::Url::parse(&config.api.openaq_base_url)?;
    let source = OpenAqSource::new(backend, base_url, Some(api_key)).with_search(&config.search);
    let presenter = Presenter::from_config(&config);

    let reports = match source.nearby(coords).await {
        Ok(reports) => reports,
        Err(e) => {
            let payload = presenter.error(&cmd.location, &e);
            match cmd.format {
                OutputFormat::Plain => println!("{payload}"),
                OutputFormat::Json => print_json(&payload)?,
            }
            return Ok(ExitCode::FAILURE);
        }
    };
    let views = presenter.stations(&reports);

    match cmd.format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Plain => {
            println!(
                "{} PM2.5 stations within {} km of {}",
                views.len(),
                config.search.radius_km,
                cmd.location
            );
            for view in &views {
                println!("  {view}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CmdResult {
    match cmd {
        ConfigCommand::Show { json } => {
            let shown = config.redacted();
            if json {
                print_json(&shown)?;
            } else {
                let set = |v: &Option<String>| if v.is_some() { "(set)" } else { "(not set)" };
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  OpenAQ URL:         {}", shown.api.openaq_base_url);
                println!("  OpenAQ API key:     {}", set(&shown.api.openaq_api_key));
                println!("  WAQI URL:           {}", shown.api.waqi_base_url);
                println!("  WAQI token:         {}", set(&shown.api.waqi_token));
                println!("  Timeout (s):        {}", shown.api.timeout_secs);
                println!("  Max retries:        {}", shown.api.max_retries);
                println!();
                println!("[Search]");
                println!("  Radius (km):        {}", shown.search.radius_km);
                println!("  Max stations:       {}", shown.search.max_stations);
                println!("  Max age (days):     {}", shown.search.max_age_days);
                println!();
                println!("[Thresholds]");
                let pm25 = &shown.thresholds.pm25;
                let ozone = &shown.thresholds.ozone;
                println!(
                    "  PM2.5 (µg/m³):      safe ≤ {}, caution ≤ {}",
                    pm25.safe_max, pm25.caution_max
                );
                println!(
                    "  Ozone (ppb):        safe ≤ {}, caution ≤ {}",
                    ozone.safe_max, ozone.caution_max
                );
                println!();
                println!("[Satellite]");
                println!("  Enabled:            {}", shown.satellite.enabled);
                println!("  Baseline (ppb):     {}", shown.satellite.baseline_ozone_ppb);
                println!("  Alert (ppb):        {}", shown.satellite.alert_ozone_ppb);
                println!();
                println!("[Fallback]");
                match shown.fallback.simulated_pm25 {
                    Some(v) => println!("  Simulated PM2.5:    {v}"),
                    None => println!("  Simulated PM2.5:    disabled"),
                }
                println!();
                println!("[Display]");
                println!("  UTC offset (h):     {}", shown.display.utc_offset_hours);
                println!();
                println!("[Cache]");
                println!("  Enabled:            {}", shown.cache.enabled);
                println!("  Database path:      {}", shown.cache_path().display());
                println!("  TTL (s):            {}", shown.cache.ttl_secs);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_cache(config: &Config, cmd: CacheCommand) -> CmdResult {
    let cache = ResponseCache::open(config.cache_path())?;
    match cmd {
        CacheCommand::Stats { json } => {
            let stats = cache.stats()?;
            if json {
                print_json(&stats)?;
            } else {
                let when = |ts: Option<chrono::DateTime<Utc>>| {
                    ts.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
                };
                println!("Response cache");
                println!("--------------");
                println!("Database:      {}", stats.path.display());
                println!("Entries:       {}", stats.entries);
                println!("Oldest:        {}", when(stats.oldest_entry));
                println!("Newest:        {}", when(stats.newest_entry));
                println!("Size (bytes):  {}", stats.db_size_bytes);
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            println!("Removed {removed} cached responses.");
        }
        CacheCommand::Prune { older_than } => {
            let secs = older_than.unwrap_or(config.cache.ttl_secs);
            let max_age = chrono::Duration::from_std(std::time::Duration::from_secs(secs))
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
            let removed = cache.prune_older_than(max_age)?;
            println!("Removed {removed} cached responses older than {secs} s.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
