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

use balancer_types::{BatteryConfig, DispatchMode, ForecastPoint, IntervalInput};

/// Resolved battery parameters in kWh for one planning run
///
/// Combines the configured battery with the capacity actually reported by the BMS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryModel {
    pub capacity_kwh: f64,
    pub hw_min_capacity_kwh: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub grid_charge_rate_kwh_per_interval: f64,
    pub self_discharge_kwh_per_hour: f64,
}

impl BatteryModel {
    pub fn from_config(config: &BatteryConfig, capacity_kwh: f64) -> Self {
        Self {
            capacity_kwh,
            hw_min_capacity_kwh: config.hw_min_capacity_kwh(capacity_kwh),
            charge_efficiency: config.charge_efficiency,
            discharge_efficiency: config.discharge_efficiency,
            grid_charge_rate_kwh_per_interval: config.grid_charge_rate_kwh_per_interval(),
            self_discharge_kwh_per_hour: config.self_discharge_kwh_per_hour,
        }
    }

    /// Convert a SOC percentage to kWh, kept inside the hardware range
    pub fn soc_kwh(&self, soc_percent: f64) -> f64 {
        self.clamp_soc(self.capacity_kwh * soc_percent / 100.0)
    }

    pub fn soc_percent(&self, soc_kwh: f64) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        soc_kwh / self.capacity_kwh * 100.0
    }

    pub fn clamp_soc(&self, soc_kwh: f64) -> f64 {
        soc_kwh.min(self.capacity_kwh).max(self.hw_min_capacity_kwh)
    }

    /// Energy still missing to a full battery
    pub fn energy_to_full(&self, soc_kwh: f64) -> f64 {
        (self.capacity_kwh - soc_kwh).max(0.0)
    }

    /// Build the simulator input for a forecast block
    pub fn interval_input(
        &self,
        mode: DispatchMode,
        point: &ForecastPoint,
        soc_kwh: f64,
        export_price: f64,
    ) -> IntervalInput {
        IntervalInput {
            mode,
            solar_kwh: point.solar_kwh.max(0.0),
            load_kwh: point.load_kwh.max(0.0),
            battery_soc_kwh: self.clamp_soc(soc_kwh),
            capacity_kwh: self.capacity_kwh,
            hw_min_capacity_kwh: self.hw_min_capacity_kwh,
            spot_price: point.spot_price,
            export_price,
            charge_efficiency: self.charge_efficiency,
            discharge_efficiency: self.discharge_efficiency,
            grid_charge_rate_kwh_per_interval: self.grid_charge_rate_kwh_per_interval,
        }
    }
}
