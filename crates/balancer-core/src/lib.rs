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

//! FluxION battery balancer core.
//!
//! Periodically forces the home battery to a full charge and holds it there so the
//! BMS can equalize cell voltages, choosing the cheapest acceptable window.

pub mod balancing;
pub mod battery;
pub mod error;
pub mod events;
pub mod persistence;
pub mod service;
pub mod simulation;
pub mod traits;

pub use balancing::{
    BalancingManager, BalancingSources, CostModel, IMMEDIATE_COST_SENTINEL, PlanBuilder,
    PlanRequest, WindowSearch,
};
pub use battery::BatteryModel;
pub use error::{BalancingError, HistoryError};
pub use events::{BalancingEvent, EventPublisher};
pub use persistence::{BalancingStore, DEFAULT_BALANCING_STATE_PATH, JsonFileStore};
pub use service::{
    BalancingHandle, BalancingService, DEFAULT_CHECK_INTERVAL, spawn_periodic_checks,
};
pub use simulation::{
    ENERGY_EPSILON_KWH, EnergyTotals, TimelineSimulation, compare_modes, simulate,
    simulate_timeline,
};
pub use traits::{BatteryStateSource, ForecastDataSource, SocHistorySource};
