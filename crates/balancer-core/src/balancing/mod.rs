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

//! Battery balancing: cost model, window search, plan building and the state machine.

pub mod cost;
pub mod detection;
pub mod manager;
pub mod plan;
pub mod window;

pub use cost::{CostModel, DelayedCost, IMMEDIATE_COST_SENTINEL};
pub use detection::{
    BALANCED_SOC_PERCENT, FullChargeRun, detect_completed_balancing, detect_natural_window,
};
pub use manager::{BalancingManager, BalancingSources};
pub use plan::{PlanBuilder, PlanRequest, align_down};
pub use window::{WindowSearch, absolute_price_threshold, cheap_price_threshold, percentile};
