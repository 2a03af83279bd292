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

pub mod balancing;
pub mod config;
pub mod forecast;
pub mod history;
pub mod inverter;
pub mod simulation;

// Re-export common types for convenience
pub use balancing::{
    BalancingCosts, BalancingInterval, BalancingMode, BalancingPlan, BalancingSnapshot,
    BalancingState, PersistedBalancingState, PlanPriority,
};
pub use config::{BalancingConfig, BatteryConfig, RawBalancingConfig, RawBatteryConfig};
pub use forecast::{BLOCK_DURATION_MINUTES, ForecastPoint, ForecastTimeline, PricePoint};
pub use history::{BatteryReading, SocStatistic};
pub use inverter::DispatchMode;
pub use simulation::{IntervalInput, IntervalResult};
