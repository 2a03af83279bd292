// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;
mod sources;

use anyhow::{Context, Result};
use balancer_core::balancing::align_down;
use balancer_core::{
    BalancingEvent, BalancingManager, BalancingService, BalancingSources, BalancingStore,
    BatteryModel, BatteryStateSource, EventPublisher, ForecastDataSource, JsonFileStore,
    compare_modes, simulate_timeline, spawn_periodic_checks,
};
use balancer_types::{BalancingState, DispatchMode};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::sources::{FileBatterySource, FileForecastSource, FileHistorySource};

#[derive(Parser)]
#[command(
    name = "fluxion-balancer",
    version,
    about = "FluxION battery balancing scheduler",
    long_about = "Keeps the home battery cells balanced by scheduling periodic full-charge \
    holding windows, preferring cheap price windows and forcing one when the cycle deadline passes."
)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted (default)
    Run,

    /// Run a single balancing check and print the resulting plan
    Check {
        /// Create a forced plan regardless of the cycle deadline
        #[arg(long)]
        force: bool,
    },

    /// Simulate dispatch modes over the current forecast
    Simulate {
        /// Single mode to simulate (grid-priority, battery-priority, solar-priority, full-charge)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Print the persisted balancing state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Check { force } => check_once(&config, force).await,
        Commands::Simulate { mode } => simulate(&config, mode.as_deref()).await,
        Commands::Status => status(&config),
    }
}

fn build_manager(config: &AppConfig) -> BalancingManager {
    let sources = BalancingSources {
        battery: Arc::new(FileBatterySource::new(&config.system.battery_path)),
        forecast: Arc::new(FileForecastSource::new(&config.system.forecast_path)),
        history: Arc::new(FileHistorySource::new(&config.system.statistics_path)),
    };
    let store: Arc<dyn BalancingStore> = Arc::new(JsonFileStore::new(&config.system.state_path));

    BalancingManager::new(
        config.balancing_config(),
        config.battery_config(),
        sources,
        store,
        EventPublisher::new(),
    )
}

async fn run(config: &AppConfig) -> Result<()> {
    let balancing = config.balancing_config();

    info!("🚀 Starting FluxION battery balancer");
    info!("📋 Configuration Summary:");
    info!("   Cycle: {} days", balancing.cycle_days);
    info!("   Holding time: {} h", balancing.holding_time_hours);
    info!("   Cooldown: {:.1} h", balancing.cooldown_hours);
    info!("   SOC threshold: {:.0}%", balancing.soc_threshold_percent);
    info!("   State file: {}", config.system.state_path);
    info!("   Check interval: {}s", config.system.check_interval_secs);

    let handle = BalancingService::spawn(build_manager(config));
    let mut events = handle.subscribe();

    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BalancingEvent::PlanCreated(plan)) => info!(
                    "📅 New {} plan: holding {} - {}",
                    plan.mode,
                    plan.holding_start.format("%Y-%m-%d %H:%M"),
                    plan.holding_end.format("%H:%M")
                ),
                Ok(event) => info!("📣 Balancing event: {}", event.name()),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {skipped} events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let checks = spawn_periodic_checks(handle.clone(), config.check_interval());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("🛑 Shutting down, state: {}", handle.state());
    checks.abort();
    event_log.abort();
    Ok(())
}

async fn check_once(config: &AppConfig, force: bool) -> Result<()> {
    let mut manager = build_manager(config);
    let plan = manager.check(force).await;

    let output = serde_json::json!({
        "plan": plan,
        "costs": manager.costs(),
        "snapshot": manager.snapshot(Utc::now()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn simulate(config: &AppConfig, mode: Option<&str>) -> Result<()> {
    let battery_config = config.battery_config();
    let battery_source = FileBatterySource::new(&config.system.battery_path);
    let forecast_source = FileForecastSource::new(&config.system.forecast_path);

    let reading = battery_source
        .read_battery()
        .await?
        .context("No battery reading available")?;
    let timeline = forecast_source.read_forecast().await?;
    if timeline.is_empty() {
        anyhow::bail!("Forecast {} is empty", config.system.forecast_path);
    }

    let capacity = reading
        .capacity_kwh
        .filter(|c| *c > 0.0)
        .unwrap_or(battery_config.capacity_kwh);
    let battery = BatteryModel::from_config(&battery_config, capacity);
    let initial_soc = battery.soc_kwh(reading.soc_percent);

    if let Some(mode) = mode {
        let mode: DispatchMode = mode.parse()?;
        let sim = simulate_timeline(mode, &battery, &timeline, initial_soc);
        println!("{}", serde_json::to_string_pretty(&sim)?);
        return Ok(());
    }

    println!(
        "{:<20} {:>12} {:>12} {:>12}",
        "Mode", "Import kWh", "Export kWh", "Net CZK"
    );
    for (mode, totals) in compare_modes(&battery, &timeline, initial_soc) {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>12.2}",
            mode.display_name(),
            totals.grid_import_kwh,
            totals.grid_export_kwh,
            totals.net_cost_czk
        );
    }
    Ok(())
}

fn status(config: &AppConfig) -> Result<()> {
    let store = JsonFileStore::new(&config.system.state_path);
    let state = store.load()?;
    let now = Utc::now();
    let cycle_days = config.balancing_config().cycle_days;

    let active = state.active_plan.as_ref().filter(|p| !p.has_expired(now));
    let tag = BalancingState::derive(active, state.days_since_last(now), cycle_days);
    let planned_mode = active.and_then(|p| p.mode_at(align_down(now)));

    let output = serde_json::json!({
        "state": tag,
        "planned_mode": planned_mode,
        "days_since_last": state.days_since_last(now),
        "persisted": state,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
