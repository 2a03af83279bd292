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

//! Cost of reaching 100% SOC now versus at a later window.

use balancer_types::ForecastTimeline;
use chrono::{DateTime, Duration, Utc};

use crate::battery::BatteryModel;

/// Cost reported when no usable price exists (CZK)
pub const IMMEDIATE_COST_SENTINEL: f64 = 999_999.0;

/// How far from `now` a price may be to count as the current price
pub const PRICE_LOOKUP_TOLERANCE_MINUTES: i64 = 60;

/// Prices balancing options against one forecast snapshot
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    timeline: &'a ForecastTimeline,
    battery: &'a BatteryModel,
    holding: Duration,
    now: DateTime<Utc>,
}

/// Breakdown of a delayed balancing option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayedCost {
    pub waiting_cost: f64,
    pub charging_cost: f64,
    pub soc_after_wait_kwh: f64,
}

impl DelayedCost {
    pub fn total(&self) -> f64 {
        self.waiting_cost + self.charging_cost
    }
}

impl<'a> CostModel<'a> {
    pub fn new(
        timeline: &'a ForecastTimeline,
        battery: &'a BatteryModel,
        holding: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timeline,
            battery,
            holding,
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn current_price(&self) -> Option<f64> {
        self.timeline.nearest_price(
            self.now,
            Duration::minutes(PRICE_LOOKUP_TOLERANCE_MINUTES),
        )
    }

    /// Cost of charging to full right now
    ///
    /// Returns [`IMMEDIATE_COST_SENTINEL`] when no price lies within an hour of now.
    pub fn immediate_cost(&self, current_soc_kwh: f64) -> f64 {
        match self.current_price() {
            Some(price) => self.battery.energy_to_full(current_soc_kwh) * price,
            None => IMMEDIATE_COST_SENTINEL,
        }
    }

    /// Cost of waiting until `window_start` and charging to full there
    ///
    /// `None` when the holding window has no prices.
    pub fn delayed_cost(
        &self,
        window_start: DateTime<Utc>,
        current_soc_kwh: f64,
    ) -> Option<DelayedCost> {
        let charging_price = self
            .timeline
            .average_price(window_start, window_start + self.holding)?;

        let wait_hours = if window_start > self.now {
            (window_start - self.now).num_seconds() as f64 / 3600.0
        } else {
            0.0
        };
        let self_discharge = self.battery.self_discharge_kwh_per_hour * wait_hours;

        let waiting_cost = if wait_hours > 0.0 {
            let grid_draw = self.timeline.grid_import_between(self.now, window_start);
            let wait_price = self
                .timeline
                .average_price(self.now, window_start)
                .or_else(|| self.current_price())
                .unwrap_or(charging_price);
            (self_discharge + grid_draw) * wait_price
        } else {
            0.0
        };

        let soc_after_wait_kwh = (current_soc_kwh - self_discharge).max(0.0);
        let charging_cost = self.battery.energy_to_full(soc_after_wait_kwh) * charging_price;

        Some(DelayedCost {
            waiting_cost,
            charging_cost,
            soc_after_wait_kwh,
        })
    }

    /// Total cost of balancing in the window starting at `window_start`
    pub fn total_delayed_cost(&self, window_start: DateTime<Utc>, current_soc_kwh: f64) -> f64 {
        self.delayed_cost(window_start, current_soc_kwh)
            .map_or(IMMEDIATE_COST_SENTINEL, |cost| cost.total())
    }
}
