mod abort;
mod alerts;
mod catalog;
mod config;
mod conjunction;
mod maneuver;
mod propagation;
mod web;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::abort::AbortHandle;
use crate::alerts::AlertStore;
use crate::catalog::{Catalog, TleLoader};
use crate::config::Config;
use crate::conjunction::{EventType, ScreeningEngine};
use crate::maneuver::{calculate_maneuver, ManeuverRequest};
use crate::propagation::{KeplerPropagator, Sgp4Propagator};

#[derive(Parser)]
#[command(name = "conjunction-screener")]
#[command(about = "Close-approach screening and avoidance maneuver planning")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Screen the catalog once and publish the alert set
    Screen {
        /// Reference time (RFC3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Print the current alerts
    Alerts {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long = "type", default_value = "COLLISION")]
        event_type: EventType,
    },
    /// Plan an avoidance maneuver for the primary object
    Maneuver {
        #[arg(long)]
        primary: u32,
        #[arg(long)]
        secondary: u32,
        /// Time of closest approach (RFC3339)
        #[arg(long)]
        tca: DateTime<Utc>,
        /// Target miss distance in km, defaults to the configured value
        #[arg(long)]
        target_miss_km: Option<f64>,
    },
    /// Check a configuration file
    ValidateConfig,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => serve(config),
        Commands::Screen { at } => screen(&config, at.unwrap_or_else(Utc::now)),
        Commands::Alerts { limit, event_type } => list_alerts(&config, limit, event_type),
        Commands::Maneuver {
            primary,
            secondary,
            tca,
            target_miss_km,
        } => plan_maneuver(
            &config,
            ManeuverRequest {
                sat_id_primary: primary,
                sat_id_secondary: secondary,
                tca,
                target_miss_km,
            },
        ),
        Commands::ValidateConfig => validate_config(&cli.config, &config),
    }
}

fn serve(config: Config) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(web::run_server(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_catalog(config: &Config) -> Option<Catalog> {
    match TleLoader::new(config.catalog.tle_folder.clone()).load() {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            None
        }
    }
}

fn screen(config: &Config, reference_time: DateTime<Utc>) -> ExitCode {
    let Some(catalog) = load_catalog(config) else {
        return ExitCode::FAILURE;
    };

    let mut engine = ScreeningEngine::new(
        Sgp4Propagator::new(config.screening.velocity),
        config.screening.params(),
    );
    if let Some(workers) = config.screening.workers {
        engine = match engine.with_workers(workers) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };
    }

    let store = AlertStore::new(config.alerts.folder.clone());
    match engine.run_screening(catalog.tracked(), reference_time, &store, &AbortHandle::new()) {
        Ok(summary) => print_json(&summary),
        Err(e) => {
            eprintln!("Screening failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_alerts(config: &Config, limit: usize, event_type: EventType) -> ExitCode {
    let store = AlertStore::new(config.alerts.folder.clone());
    match store.get_alerts(limit, event_type) {
        Ok(alerts) => {
            if alerts.is_empty() {
                println!("No {} alerts", event_type);
                return ExitCode::SUCCESS;
            }
            for a in alerts {
                println!(
                    "{:>4}  {:>6} - {:<6}  TCA {}  miss {:>9.3} km  v_rel {:>7.4} km/s  score {:.3}",
                    a.id,
                    a.sat1_id,
                    a.sat2_id,
                    a.tca.format("%Y-%m-%d %H:%M:%S"),
                    a.miss_distance_km,
                    a.rel_velocity_km_s,
                    a.score
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error reading alerts: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn plan_maneuver(config: &Config, request: ManeuverRequest) -> ExitCode {
    let Some(catalog) = load_catalog(config) else {
        return ExitCode::FAILURE;
    };

    match calculate_maneuver(
        &catalog,
        &Sgp4Propagator::new(config.screening.velocity),
        &KeplerPropagator::default(),
        &request,
        &config.maneuver.params(),
    ) {
        Ok(proposal) => print_json(&proposal),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate_config(path: &Path, config: &Config) -> ExitCode {
    let params = config.screening.params();
    println!("Configuration {} is valid", path.display());
    println!("  TLE folder:    {}", config.catalog.tle_folder.display());
    println!("  Alerts folder: {}", config.alerts.folder.display());
    println!(
        "  Screening:     prune {} km, window {} s, critical {} km, monitoring {} km",
        params.prune_radius_km,
        params.analytic_window_sec,
        params.critical_distance_km,
        params.monitoring_threshold_km
    );
    println!("  API keys:      {}", config.api_keys.len());
    ExitCode::SUCCESS
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error encoding result: {}", e);
            ExitCode::FAILURE
        }
    }
}
