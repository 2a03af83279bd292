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

//! Turns a chosen holding window into an interval-by-interval plan.

use balancer_types::{
    BLOCK_DURATION_MINUTES, BalancingConfig, BalancingInterval, BalancingMode, BalancingPlan,
    DispatchMode,
};
use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::battery::BatteryModel;
use crate::simulation::ENERGY_EPSILON_KWH;

/// Longest charging ramp a plan may contain (one week of blocks)
pub const MAX_RAMP_BLOCKS: i64 = 7 * 24 * 60 / BLOCK_DURATION_MINUTES;

fn block() -> Duration {
    Duration::minutes(BLOCK_DURATION_MINUTES)
}

/// Floor a timestamp to the 15-minute grid
pub fn align_down(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(block()).unwrap_or(ts)
}

/// Everything needed to lay out one plan
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub mode: BalancingMode,
    pub reason: String,
    pub holding_start: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub current_soc_kwh: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'a> {
    battery: &'a BatteryModel,
    config: &'a BalancingConfig,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(battery: &'a BatteryModel, config: &'a BalancingConfig) -> Self {
        Self { battery, config }
    }

    /// Number of grid-charging intervals needed to reach 100% from `soc_kwh`
    ///
    /// Capped at [`MAX_RAMP_BLOCKS`].
    pub fn ramp_blocks(&self, soc_kwh: f64) -> i64 {
        let energy = self.battery.energy_to_full(soc_kwh);
        let stored_per_block =
            self.battery.grid_charge_rate_kwh_per_interval * self.battery.charge_efficiency;
        if energy < ENERGY_EPSILON_KWH || stored_per_block <= 0.0 {
            return 0;
        }

        let blocks = (energy / stored_per_block).ceil();
        if blocks >= MAX_RAMP_BLOCKS as f64 {
            MAX_RAMP_BLOCKS
        } else {
            blocks as i64
        }
    }

    fn ramp_duration(&self, soc_kwh: f64) -> Duration {
        Duration::minutes(BLOCK_DURATION_MINUTES * self.ramp_blocks(soc_kwh))
    }

    /// Earliest aligned holding start reachable after the charging ramp
    pub fn asap_holding_start(&self, now: DateTime<Utc>, soc_kwh: f64) -> DateTime<Utc> {
        align_down(now) + self.ramp_duration(soc_kwh)
    }

    /// Build the plan: charging ramp followed by the holding block
    pub fn build(&self, request: PlanRequest) -> BalancingPlan {
        let holding_start = align_down(request.holding_start);
        let holding_end = holding_start + self.config.holding_duration();

        let (first, dispatch_mode) = match request.mode {
            BalancingMode::Natural => (holding_start, DispatchMode::GridPriority),
            BalancingMode::Opportunistic | BalancingMode::Forced => {
                let ramp = self.ramp_duration(request.current_soc_kwh);
                let first = (holding_start - ramp).max(align_down(request.now));
                (first.min(holding_start), DispatchMode::FullCharge)
            }
        };

        let mut intervals = Vec::new();
        let mut ts = first;
        while ts < holding_end {
            intervals.push(BalancingInterval {
                timestamp: ts,
                dispatch_mode,
            });
            ts += block();
        }

        BalancingPlan {
            mode: request.mode,
            created_at: request.now,
            reason: request.reason,
            holding_start,
            holding_end,
            intervals,
            locked: request.mode == BalancingMode::Forced,
            priority: request.mode.priority(),
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balancer_types::{BatteryConfig, PlanPriority};
    use chrono::TimeZone;

    fn battery() -> BatteryModel {
        BatteryModel::from_config(&BatteryConfig::default(), 10.0)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 22, 7, 30).unwrap()
    }

    fn request(mode: BalancingMode, holding_start: DateTime<Utc>, soc: f64) -> PlanRequest {
        PlanRequest {
            mode,
            reason: "test".to_owned(),
            holding_start,
            now: now(),
            current_soc_kwh: soc,
        }
    }

    fn assert_plan_invariants(plan: &BalancingPlan, config: &BalancingConfig) {
        assert_eq!(plan.holding_duration(), config.holding_duration());
        assert!(
            plan.intervals
                .windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == Duration::minutes(15))
        );
        assert_eq!(
            plan.intervals.last().map(|i| i.timestamp),
            Some(plan.holding_end - Duration::minutes(15))
        );
    }

    #[test]
    fn test_alignment() {
        assert_eq!(
            align_down(now()),
            Utc.with_ymd_and_hms(2025, 3, 1, 22, 0, 0).unwrap()
        );
        let aligned = Utc.with_ymd_and_hms(2025, 3, 1, 22, 30, 0).unwrap();
        assert_eq!(align_down(aligned), aligned);
    }

    #[test]
    fn test_ramp_blocks() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);

        // 0.7 kWh metered per block at 95% stores 0.665 kWh
        assert_eq!(builder.ramp_blocks(10.0), 0);
        assert_eq!(builder.ramp_blocks(9.5), 1);
        assert_eq!(builder.ramp_blocks(8.0), 4);
    }

    #[test]
    fn test_ramp_is_capped_for_tiny_charge_rate() {
        let mut battery = battery();
        battery.grid_charge_rate_kwh_per_interval = 1e-9 / 4.0;
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);

        assert_eq!(builder.ramp_blocks(2.0), MAX_RAMP_BLOCKS);
        assert_eq!(
            builder.asap_holding_start(now(), 2.0),
            align_down(now()) + Duration::days(7)
        );

        let plan = builder.build(request(BalancingMode::Forced, now(), 2.0));
        assert_eq!(plan.intervals[0].timestamp, align_down(now()));
        assert_plan_invariants(&plan, &config);
    }

    #[test]
    fn test_asap_holding_start() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);

        assert_eq!(
            builder.asap_holding_start(now(), 8.0),
            Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_forced_plan_layout() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);
        let start = builder.asap_holding_start(now(), 8.0);

        let plan = builder.build(request(BalancingMode::Forced, start, 8.0));

        assert_plan_invariants(&plan, &config);
        assert_eq!(plan.intervals.len(), 4 + 12);
        assert_eq!(plan.intervals[0].timestamp, align_down(now()));
        assert!(
            plan.intervals
                .iter()
                .all(|i| i.dispatch_mode == DispatchMode::FullCharge)
        );
        assert!(plan.locked);
        assert_eq!(plan.priority, PlanPriority::Critical);
        assert!(plan.active);
    }

    #[test]
    fn test_ramp_never_starts_in_the_past() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);
        let start = align_down(now()) + Duration::minutes(30);

        let plan = builder.build(request(BalancingMode::Opportunistic, start, 4.0));

        assert_plan_invariants(&plan, &config);
        assert_eq!(plan.intervals[0].timestamp, align_down(now()));
        assert!(!plan.locked);
        assert_eq!(plan.priority, PlanPriority::Normal);
    }

    #[test]
    fn test_natural_plan_only_holds() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);
        let start = Utc.with_ymd_and_hms(2025, 3, 2, 11, 0, 0).unwrap();

        let plan = builder.build(request(BalancingMode::Natural, start, 6.0));

        assert_plan_invariants(&plan, &config);
        assert_eq!(plan.intervals.len(), 12);
        assert_eq!(plan.intervals[0].timestamp, start);
        assert!(
            plan.intervals
                .iter()
                .all(|i| i.dispatch_mode == DispatchMode::GridPriority)
        );
        assert_eq!(plan.priority, PlanPriority::Low);
    }

    #[test]
    fn test_unaligned_start_is_floored() {
        let battery = battery();
        let config = BalancingConfig::default();
        let builder = PlanBuilder::new(&battery, &config);
        let start = Utc.with_ymd_and_hms(2025, 3, 2, 3, 10, 0).unwrap();

        let plan = builder.build(request(BalancingMode::Opportunistic, start, 9.5));

        assert_eq!(
            plan.holding_start,
            Utc.with_ymd_and_hms(2025, 3, 2, 3, 0, 0).unwrap()
        );
        assert_plan_invariants(&plan, &config);
    }
}
