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

//! Interval simulation engine.
//!
//! Simulates one 15-minute interval of energy flows for a given dispatch mode,
//! and whole forecast timelines on top of that.

use balancer_types::{DispatchMode, ForecastTimeline, IntervalInput, IntervalResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::battery::BatteryModel;

/// Energies below this are treated as zero (kWh)
pub const ENERGY_EPSILON_KWH: f64 = 0.001;

/// Default grid export price as a fraction of import price
pub const DEFAULT_EXPORT_PRICE_RATIO: f64 = 0.8;

/// Energy flows before SOC update and costing
#[derive(Debug, Clone, Copy, Default)]
struct Flows {
    charge_kwh: f64,
    discharge_kwh: f64,
    import_kwh: f64,
    export_kwh: f64,
}

/// Simulate one interval
///
/// Total function: every valid input yields a result with
/// `hw_min_capacity_kwh <= new_soc_kwh <= capacity_kwh`.
pub fn simulate(input: &IntervalInput) -> IntervalResult {
    let flows = if input.mode.is_self_consumption() && is_negligible(input.solar_kwh) {
        // Without solar the three self-consumption modes behave the same
        night(input)
    } else {
        match input.mode {
            DispatchMode::GridPriority => grid_priority(input),
            DispatchMode::BatteryPriority => battery_priority(input),
            DispatchMode::SolarPriority => solar_priority(input),
            DispatchMode::FullCharge => full_charge(input),
        }
    };

    settle(input, flows)
}

fn is_negligible(kwh: f64) -> bool {
    kwh < ENERGY_EPSILON_KWH
}

fn snap(kwh: f64) -> f64 {
    if kwh.abs() < ENERGY_EPSILON_KWH {
        0.0
    } else {
        kwh
    }
}

/// Metered energy the battery can still absorb
fn charge_headroom(input: &IntervalInput) -> f64 {
    if input.charge_efficiency <= 0.0 {
        return 0.0;
    }
    (input.capacity_kwh - input.battery_soc_kwh).max(0.0) / input.charge_efficiency
}

/// Energy the battery can deliver before reaching the hardware floor
fn discharge_available(input: &IntervalInput) -> f64 {
    (input.battery_soc_kwh - input.hw_min_capacity_kwh).max(0.0) * input.discharge_efficiency
}

fn night(input: &IntervalInput) -> Flows {
    cover_deficit(input, input.load_kwh, true)
}

fn cover_deficit(input: &IntervalInput, deficit: f64, use_battery: bool) -> Flows {
    if is_negligible(deficit) {
        return Flows::default();
    }

    let discharge = if use_battery {
        deficit.min(discharge_available(input))
    } else {
        0.0
    };

    Flows {
        discharge_kwh: discharge,
        import_kwh: deficit - discharge,
        ..Flows::default()
    }
}

fn store_surplus(input: &IntervalInput, surplus: f64) -> Flows {
    if is_negligible(surplus) {
        return Flows::default();
    }

    let charge = surplus.min(charge_headroom(input));
    Flows {
        charge_kwh: charge,
        export_kwh: surplus - charge,
        ..Flows::default()
    }
}

fn grid_priority(input: &IntervalInput) -> Flows {
    let net = input.solar_kwh - input.load_kwh;
    if net >= 0.0 {
        store_surplus(input, net)
    } else {
        cover_deficit(input, -net, true)
    }
}

fn battery_priority(input: &IntervalInput) -> Flows {
    let net = input.solar_kwh - input.load_kwh;
    if net >= 0.0 {
        store_surplus(input, net)
    } else {
        cover_deficit(input, -net, false)
    }
}

fn solar_priority(input: &IntervalInput) -> Flows {
    let stored = store_surplus(input, input.solar_kwh);
    Flows {
        import_kwh: input.load_kwh,
        ..stored
    }
}

fn full_charge(input: &IntervalInput) -> Flows {
    let headroom = charge_headroom(input);
    let solar_charge = input.solar_kwh.min(headroom);
    let grid_charge = input
        .grid_charge_rate_kwh_per_interval
        .max(0.0)
        .min(headroom - solar_charge);

    Flows {
        charge_kwh: solar_charge + grid_charge,
        discharge_kwh: 0.0,
        import_kwh: input.load_kwh + grid_charge,
        export_kwh: input.solar_kwh - solar_charge,
    }
}

fn settle(input: &IntervalInput, flows: Flows) -> IntervalResult {
    let charge = snap(flows.charge_kwh);
    let discharge = snap(flows.discharge_kwh);
    let import = snap(flows.import_kwh);
    let export = snap(flows.export_kwh);

    let mut soc = input.battery_soc_kwh + charge * input.charge_efficiency;
    if discharge > 0.0 && input.discharge_efficiency > 0.0 {
        soc -= discharge / input.discharge_efficiency;
    }
    let new_soc_kwh = soc.min(input.capacity_kwh).max(input.hw_min_capacity_kwh);

    let grid_cost = import * input.spot_price;
    let export_revenue = export * input.export_price;

    IntervalResult {
        new_soc_kwh,
        grid_import_kwh: import,
        grid_export_kwh: export,
        battery_charge_kwh: charge,
        battery_discharge_kwh: discharge,
        grid_cost,
        export_revenue,
        net_cost: grid_cost - export_revenue,
    }
}

// ============= Timeline simulation =============

/// Summed flows and money over a simulated timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyTotals {
    pub solar_kwh: f64,
    pub consumption_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
    pub battery_charge_kwh: f64,
    pub battery_discharge_kwh: f64,
    pub grid_import_cost_czk: f64,
    pub grid_export_revenue_czk: f64,
    pub net_cost_czk: f64,
}

impl EnergyTotals {
    fn add(&mut self, input: &IntervalInput, result: &IntervalResult) {
        self.solar_kwh += input.solar_kwh;
        self.consumption_kwh += input.load_kwh;
        self.grid_import_kwh += result.grid_import_kwh;
        self.grid_export_kwh += result.grid_export_kwh;
        self.battery_charge_kwh += result.battery_charge_kwh;
        self.battery_discharge_kwh += result.battery_discharge_kwh;
        self.grid_import_cost_czk += result.grid_cost;
        self.grid_export_revenue_czk += result.export_revenue;
        self.net_cost_czk += result.net_cost;
    }
}

/// One simulated forecast block
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedInterval {
    pub timestamp: DateTime<Utc>,
    pub result: IntervalResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSimulation {
    pub mode: DispatchMode,
    pub intervals: Vec<SimulatedInterval>,
    pub totals: EnergyTotals,
    pub final_soc_kwh: f64,
}

/// Run one dispatch mode over every forecast block, carrying SOC forward
pub fn simulate_timeline(
    mode: DispatchMode,
    battery: &BatteryModel,
    timeline: &ForecastTimeline,
    initial_soc_kwh: f64,
) -> TimelineSimulation {
    let mut soc = battery.clamp_soc(initial_soc_kwh);
    let mut totals = EnergyTotals::default();
    let mut intervals = Vec::with_capacity(timeline.len());

    for point in timeline.points() {
        let export_price = point.spot_price * DEFAULT_EXPORT_PRICE_RATIO;
        let input = battery.interval_input(mode, point, soc, export_price);
        let result = simulate(&input);

        totals.add(&input, &result);
        soc = result.new_soc_kwh;
        intervals.push(SimulatedInterval {
            timestamp: point.timestamp,
            result,
        });
    }

    TimelineSimulation {
        mode,
        intervals,
        totals,
        final_soc_kwh: soc,
    }
}

/// Simulate every dispatch mode, cheapest first
pub fn compare_modes(
    battery: &BatteryModel,
    timeline: &ForecastTimeline,
    initial_soc_kwh: f64,
) -> Vec<(DispatchMode, EnergyTotals)> {
    let mut results: Vec<(DispatchMode, EnergyTotals)> = DispatchMode::all()
        .iter()
        .map(|mode| {
            let sim = simulate_timeline(*mode, battery, timeline, initial_soc_kwh);
            (*mode, sim.totals)
        })
        .collect();

    results.sort_by(|a, b| a.1.net_cost_czk.total_cmp(&b.1.net_cost_czk));
    results
}
