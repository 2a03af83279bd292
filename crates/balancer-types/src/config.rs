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

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::forecast::BLOCK_DURATION_MINUTES;

// ============= Balancing Configuration =============

/// Balancing scheduler configuration
///
/// Built from [`RawBalancingConfig`] so that a single bad value never prevents startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingConfig {
    /// How long the battery must stay at ~100% for a cycle to count
    pub holding_time_hours: u32,

    /// Maximum days between two balancing cycles before one is forced
    pub cycle_days: u32,

    /// Minimum time between two opportunistic attempts
    pub cooldown_hours: f64,

    /// Minimum current SOC for opportunistic balancing (percent)
    pub soc_threshold_percent: f64,

    /// Percentile of future prices a window must undercut
    pub cheap_window_percentile: f64,

    /// Absolute price ceiling while the deadline is far away (CZK/kWh)
    pub opportunistic_price_threshold: f64,

    /// Absolute price ceiling in the last two days before the deadline (CZK/kWh)
    pub economic_price_threshold: f64,
}

pub const DEFAULT_HOLDING_TIME_HOURS: u32 = 3;
pub const DEFAULT_CYCLE_DAYS: u32 = 7;
pub const DEFAULT_SOC_THRESHOLD_PERCENT: f64 = 80.0;
pub const DEFAULT_CHEAP_WINDOW_PERCENTILE: f64 = 30.0;
pub const DEFAULT_OPPORTUNISTIC_PRICE_THRESHOLD: f64 = 1.1;
pub const DEFAULT_ECONOMIC_PRICE_THRESHOLD: f64 = 2.5;

/// Default cooldown: 70% of the cycle, never less than a day
pub fn default_cooldown_hours(cycle_days: u32) -> f64 {
    (f64::from(cycle_days) * 24.0 * 0.7).max(24.0)
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            holding_time_hours: DEFAULT_HOLDING_TIME_HOURS,
            cycle_days: DEFAULT_CYCLE_DAYS,
            cooldown_hours: default_cooldown_hours(DEFAULT_CYCLE_DAYS),
            soc_threshold_percent: DEFAULT_SOC_THRESHOLD_PERCENT,
            cheap_window_percentile: DEFAULT_CHEAP_WINDOW_PERCENTILE,
            opportunistic_price_threshold: DEFAULT_OPPORTUNISTIC_PRICE_THRESHOLD,
            economic_price_threshold: DEFAULT_ECONOMIC_PRICE_THRESHOLD,
        }
    }
}

impl BalancingConfig {
    /// Build the configuration from raw option values
    ///
    /// Every value is parsed and range-checked on its own. Missing values use the
    /// documented default, invalid ones are logged and replaced by the default.
    pub fn from_raw(raw: &RawBalancingConfig) -> Self {
        let holding_time_hours = parse_whole(
            raw.holding_time_hours.as_ref(),
            "holding_time_hours",
            DEFAULT_HOLDING_TIME_HOURS,
            1..=24,
        );
        let cycle_days = parse_whole(
            raw.cycle_days.as_ref(),
            "cycle_days",
            DEFAULT_CYCLE_DAYS,
            1..=60,
        );
        let cooldown_hours = parse_real(
            raw.cooldown_hours.as_ref(),
            "cooldown_hours",
            default_cooldown_hours(cycle_days),
            |v| v >= 0.0,
        );
        let soc_threshold_percent = parse_real(
            raw.soc_threshold_percent.as_ref(),
            "soc_threshold_percent",
            DEFAULT_SOC_THRESHOLD_PERCENT,
            |v| (0.0..=100.0).contains(&v),
        );
        let cheap_window_percentile = parse_real(
            raw.cheap_window_percentile.as_ref(),
            "cheap_window_percentile",
            DEFAULT_CHEAP_WINDOW_PERCENTILE,
            |v| (0.0..=100.0).contains(&v),
        );
        let opportunistic_price_threshold = parse_real(
            raw.opportunistic_price_threshold.as_ref(),
            "opportunistic_price_threshold",
            DEFAULT_OPPORTUNISTIC_PRICE_THRESHOLD,
            f64::is_finite,
        );
        let economic_price_threshold = parse_real(
            raw.economic_price_threshold.as_ref(),
            "economic_price_threshold",
            DEFAULT_ECONOMIC_PRICE_THRESHOLD,
            f64::is_finite,
        );

        Self {
            holding_time_hours,
            cycle_days,
            cooldown_hours,
            soc_threshold_percent,
            cheap_window_percentile,
            opportunistic_price_threshold,
            economic_price_threshold,
        }
    }

    pub fn holding_duration(&self) -> Duration {
        Duration::hours(i64::from(self.holding_time_hours))
    }

    /// Number of 15-minute blocks in the holding window
    pub fn holding_blocks(&self) -> usize {
        (i64::from(self.holding_time_hours) * 60 / BLOCK_DURATION_MINUTES) as usize
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds((self.cooldown_hours * 3600.0).round() as i64)
    }
}

/// Balancing options as they arrive from config.toml or HA addon options
///
/// Values may be numbers or numeric strings; anything else falls back to the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBalancingConfig {
    #[serde(default)]
    pub holding_time_hours: Option<Value>,
    #[serde(default)]
    pub cycle_days: Option<Value>,
    #[serde(default)]
    pub cooldown_hours: Option<Value>,
    #[serde(default)]
    pub soc_threshold_percent: Option<Value>,
    #[serde(default)]
    pub cheap_window_percentile: Option<Value>,
    #[serde(default)]
    pub opportunistic_price_threshold: Option<Value>,
    #[serde(default)]
    pub economic_price_threshold: Option<Value>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_real(value: Option<&Value>, key: &str, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
    let Some(value) = value else {
        return default;
    };
    match as_number(value) {
        Some(v) if v.is_finite() && valid(v) => v,
        _ => {
            warn!(
                "⚠️ Invalid value for {}: {} - using default {}",
                key, value, default
            );
            default
        }
    }
}

fn parse_whole(
    value: Option<&Value>,
    key: &str,
    default: u32,
    range: std::ops::RangeInclusive<u32>,
) -> u32 {
    let Some(value) = value else {
        return default;
    };
    match as_number(value) {
        Some(v)
            if v.fract() == 0.0
                && v >= f64::from(*range.start())
                && v <= f64::from(*range.end()) =>
        {
            v as u32
        }
        _ => {
            warn!(
                "⚠️ Invalid value for {}: {} - using default {}",
                key, value, default
            );
            default
        }
    }
}

// ============= Battery Configuration =============

/// Physical battery parameters used for simulation and cost estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Usable capacity, used when the BMS does not report one (kWh)
    #[serde(default = "default_capacity_kwh")]
    pub capacity_kwh: f64,

    /// Hardware minimum SOC enforced by the inverter firmware (percent)
    #[serde(default = "default_hardware_min_soc")]
    pub hardware_min_soc_percent: f64,

    /// Charge efficiency (0.0 to 1.0)
    #[serde(default = "default_efficiency")]
    pub charge_efficiency: f64,

    /// Discharge efficiency (0.0 to 1.0)
    #[serde(default = "default_efficiency")]
    pub discharge_efficiency: f64,

    /// Sustained grid charging power (kW)
    #[serde(default = "default_grid_charge_rate_kw")]
    pub grid_charge_rate_kw: f64,

    /// Standby self-discharge of the battery (kWh per hour)
    #[serde(default = "default_self_discharge")]
    pub self_discharge_kwh_per_hour: f64,
}

/// Battery options as they arrive from config.toml or HA addon options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatteryConfig {
    #[serde(default)]
    pub capacity_kwh: Option<Value>,
    #[serde(default)]
    pub hardware_min_soc_percent: Option<Value>,
    #[serde(default)]
    pub charge_efficiency: Option<Value>,
    #[serde(default)]
    pub discharge_efficiency: Option<Value>,
    #[serde(default)]
    pub grid_charge_rate_kw: Option<Value>,
    #[serde(default)]
    pub self_discharge_kwh_per_hour: Option<Value>,
}

fn default_capacity_kwh() -> f64 {
    12.29
}

fn default_hardware_min_soc() -> f64 {
    20.0 // Typical firmware floor
}

fn default_efficiency() -> f64 {
    0.95
}

fn default_grid_charge_rate_kw() -> f64 {
    2.8
}

fn default_self_discharge() -> f64 {
    0.02
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: default_capacity_kwh(),
            hardware_min_soc_percent: default_hardware_min_soc(),
            charge_efficiency: default_efficiency(),
            discharge_efficiency: default_efficiency(),
            grid_charge_rate_kw: default_grid_charge_rate_kw(),
            self_discharge_kwh_per_hour: default_self_discharge(),
        }
    }
}

impl BatteryConfig {
    /// Build the battery configuration from raw option values
    ///
    /// Same rules as [`BalancingConfig::from_raw`]: a bad value never prevents startup.
    pub fn from_raw(raw: &RawBatteryConfig) -> Self {
        Self {
            capacity_kwh: parse_real(
                raw.capacity_kwh.as_ref(),
                "capacity_kwh",
                default_capacity_kwh(),
                |v| v > 0.0,
            ),
            hardware_min_soc_percent: parse_real(
                raw.hardware_min_soc_percent.as_ref(),
                "hardware_min_soc_percent",
                default_hardware_min_soc(),
                |v| (0.0..100.0).contains(&v),
            ),
            charge_efficiency: parse_real(
                raw.charge_efficiency.as_ref(),
                "charge_efficiency",
                default_efficiency(),
                |v| v > 0.0 && v <= 1.0,
            ),
            discharge_efficiency: parse_real(
                raw.discharge_efficiency.as_ref(),
                "discharge_efficiency",
                default_efficiency(),
                |v| v > 0.0 && v <= 1.0,
            ),
            grid_charge_rate_kw: parse_real(
                raw.grid_charge_rate_kw.as_ref(),
                "grid_charge_rate_kw",
                default_grid_charge_rate_kw(),
                |v| v > 0.0,
            ),
            self_discharge_kwh_per_hour: parse_real(
                raw.self_discharge_kwh_per_hour.as_ref(),
                "self_discharge_kwh_per_hour",
                default_self_discharge(),
                |v| v >= 0.0,
            ),
        }
    }

    /// Replace out-of-range values with their defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !(self.capacity_kwh.is_finite() && self.capacity_kwh > 0.0) {
            warn!(
                "⚠️ Invalid battery capacity {} kWh - using default {}",
                self.capacity_kwh, defaults.capacity_kwh
            );
            self.capacity_kwh = defaults.capacity_kwh;
        }
        if !(0.0..100.0).contains(&self.hardware_min_soc_percent) {
            warn!(
                "⚠️ Invalid hardware min SOC {}% - using default {}%",
                self.hardware_min_soc_percent, defaults.hardware_min_soc_percent
            );
            self.hardware_min_soc_percent = defaults.hardware_min_soc_percent;
        }
        if !(self.charge_efficiency > 0.0 && self.charge_efficiency <= 1.0) {
            warn!(
                "⚠️ Invalid charge efficiency {} - using default {}",
                self.charge_efficiency, defaults.charge_efficiency
            );
            self.charge_efficiency = defaults.charge_efficiency;
        }
        if !(self.discharge_efficiency > 0.0 && self.discharge_efficiency <= 1.0) {
            warn!(
                "⚠️ Invalid discharge efficiency {} - using default {}",
                self.discharge_efficiency, defaults.discharge_efficiency
            );
            self.discharge_efficiency = defaults.discharge_efficiency;
        }
        if !(self.grid_charge_rate_kw.is_finite() && self.grid_charge_rate_kw > 0.0) {
            warn!(
                "⚠️ Invalid grid charge rate {} kW - using default {}",
                self.grid_charge_rate_kw, defaults.grid_charge_rate_kw
            );
            self.grid_charge_rate_kw = defaults.grid_charge_rate_kw;
        }
        if !(self.self_discharge_kwh_per_hour.is_finite() && self.self_discharge_kwh_per_hour >= 0.0)
        {
            self.self_discharge_kwh_per_hour = defaults.self_discharge_kwh_per_hour;
        }

        self
    }

    /// Hardware floor in kWh for the given capacity
    pub fn hw_min_capacity_kwh(&self, capacity_kwh: f64) -> f64 {
        capacity_kwh * self.hardware_min_soc_percent / 100.0
    }

    /// Grid charging energy per 15-minute block
    pub fn grid_charge_rate_kwh_per_interval(&self) -> f64 {
        self.grid_charge_rate_kw * BLOCK_DURATION_MINUTES as f64 / 60.0
    }
}
