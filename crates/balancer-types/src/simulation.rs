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

use serde::{Deserialize, Serialize};

use crate::inverter::DispatchMode;

/// Everything the simulator needs to know about one 15-minute interval
///
/// All energies are in kWh for the whole interval, prices in CZK/kWh.
/// The caller guarantees `hw_min_capacity_kwh <= battery_soc_kwh <= capacity_kwh`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalInput {
    pub mode: DispatchMode,
    pub solar_kwh: f64,
    pub load_kwh: f64,
    pub battery_soc_kwh: f64,
    pub capacity_kwh: f64,
    /// Energy the inverter firmware never discharges below
    pub hw_min_capacity_kwh: f64,
    /// Grid import price (CZK/kWh)
    pub spot_price: f64,
    /// Grid export price (CZK/kWh)
    pub export_price: f64,
    /// Fraction of metered energy that ends up stored (0.0 to 1.0)
    pub charge_efficiency: f64,
    /// Fraction of stored energy that reaches the load (0.0 to 1.0)
    pub discharge_efficiency: f64,
    /// Upper bound for grid charging in `FullCharge` mode
    pub grid_charge_rate_kwh_per_interval: f64,
}

/// Energy flows and money for one simulated interval
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalResult {
    pub new_soc_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
    /// Metered energy that went into the battery (before charge losses)
    pub battery_charge_kwh: f64,
    /// Energy delivered by the battery (after discharge losses)
    pub battery_discharge_kwh: f64,
    pub grid_cost: f64,
    pub export_revenue: f64,
    pub net_cost: f64,
}
