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

use anyhow::{Context, Result};
use balancer_core::{DEFAULT_BALANCING_STATE_PATH, DEFAULT_CHECK_INTERVAL};
use balancer_types::{BalancingConfig, BatteryConfig, RawBalancingConfig, RawBatteryConfig};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// HA addon options file
pub const ADDON_OPTIONS_PATH: &str = "/data/options.json";

/// Development config file in the working directory
pub const DEV_CONFIG_PATH: &str = "config.toml";

/// Shortest accepted period between scheduled checks
const MIN_CHECK_INTERVAL_SECS: u64 = 60;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Balancing options, validated leniently one value at a time
    #[serde(default)]
    pub balancing: RawBalancingConfig,

    /// Battery options, validated the same way
    #[serde(default)]
    pub battery: RawBatteryConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Period between scheduled balancing checks
    #[serde(
        default = "default_check_interval_secs",
        deserialize_with = "lenient_check_interval"
    )]
    pub check_interval_secs: u64,

    /// Balancing state document
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Dispatch forecast exported by the planner (JSON array of 15-minute records)
    #[serde(default = "default_forecast_path")]
    pub forecast_path: String,

    /// Hourly SOC statistics exported from the recorder
    #[serde(default = "default_statistics_path")]
    pub statistics_path: String,

    /// Current battery reading
    #[serde(default = "default_battery_path")]
    pub battery_path: String,
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_secs()
}

/// Accept numbers or numeric strings; anything else falls back to the default
fn lenient_check_interval<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    Ok(parsed.unwrap_or_else(|| {
        let default = default_check_interval_secs();
        warn!("⚠️ Invalid value for check_interval_secs: {value} - using default {default}");
        default
    }))
}

fn default_state_path() -> String {
    DEFAULT_BALANCING_STATE_PATH.to_owned()
}

fn default_forecast_path() -> String {
    "./data/forecast.json".to_owned()
}

fn default_statistics_path() -> String {
    "./data/soc_statistics.json".to_owned()
}

fn default_battery_path() -> String {
    "./data/battery.json".to_owned()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            state_path: default_state_path(),
            forecast_path: default_forecast_path(),
            statistics_path: default_statistics_path(),
            battery_path: default_battery_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// Order: explicit path, HA addon options, config.toml, then defaults with
    /// environment variable overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let mut config = Self::from_file(path)?;
            info!("✅ Loaded configuration from {}", path.display());
            config.sanitize();
            return Ok(config);
        }

        // Try HA addon options first (/data/options.json)
        if let Ok(options_str) = std::fs::read_to_string(ADDON_OPTIONS_PATH) {
            let mut config: AppConfig =
                serde_json::from_str(&options_str).context("Failed to parse HA addon options")?;
            info!("✅ Loaded configuration from HA addon options");
            config.sanitize();
            return Ok(config);
        }

        // Try config.toml for development
        if let Ok(config_str) = std::fs::read_to_string(DEV_CONFIG_PATH) {
            let mut config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            info!("✅ Loaded configuration from config.toml");
            config.sanitize();
            return Ok(config);
        }

        // Fall back to defaults with environment variable overrides
        warn!("No configuration file found, using defaults with environment overrides");
        let mut config = Self::from_env();
        config.sanitize();
        Ok(config)
    }

    /// Parse a config file, TOML or JSON by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    /// Load from environment variables (development/testing)
    fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BALANCER_STATE_PATH") {
            self.system.state_path = path;
        }
        if let Some(path) = lookup("BALANCER_FORECAST_PATH") {
            self.system.forecast_path = path;
        }
        if let Some(path) = lookup("BALANCER_STATISTICS_PATH") {
            self.system.statistics_path = path;
        }
        if let Some(path) = lookup("BALANCER_BATTERY_PATH") {
            self.system.battery_path = path;
        }
        if let Some(interval) = lookup("CHECK_INTERVAL_SECS")
            && let Ok(secs) = interval.parse::<u64>()
        {
            self.system.check_interval_secs = secs;
        }
    }

    /// Replace out-of-range system values with their defaults
    ///
    /// Balancing and battery values are repaired individually when converted.
    pub fn sanitize(&mut self) {
        let defaults = SystemConfig::default();

        if self.system.check_interval_secs < MIN_CHECK_INTERVAL_SECS {
            warn!(
                "⚠️ check_interval_secs {} is below {MIN_CHECK_INTERVAL_SECS} - using default {}",
                self.system.check_interval_secs, defaults.check_interval_secs
            );
            self.system.check_interval_secs = defaults.check_interval_secs;
        }

        for (name, path, default) in [
            ("state_path", &mut self.system.state_path, defaults.state_path),
            ("forecast_path", &mut self.system.forecast_path, defaults.forecast_path),
            (
                "statistics_path",
                &mut self.system.statistics_path,
                defaults.statistics_path,
            ),
            ("battery_path", &mut self.system.battery_path, defaults.battery_path),
        ] {
            if path.trim().is_empty() {
                warn!("⚠️ {name} is empty - using default {default}");
                *path = default;
            }
        }
    }

    pub fn balancing_config(&self) -> BalancingConfig {
        BalancingConfig::from_raw(&self.balancing)
    }

    pub fn battery_config(&self) -> BatteryConfig {
        BatteryConfig::from_raw(&self.battery)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.system.check_interval_secs)
    }
}
