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

//! Cheap holding window search.

use balancer_types::{BLOCK_DURATION_MINUTES, BalancingConfig, PricePoint};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use super::cost::CostModel;

/// How far ahead windows are considered
pub const SEARCH_HORIZON_HOURS: i64 = 48;

/// Days before the cycle deadline at which the economic price ceiling applies
pub const DEADLINE_APPROACH_DAYS: f64 = 2.0;

/// Linear-interpolation percentile (0-100) of unsorted values
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = pct.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let low = *sorted.get(lower)?;
    let high = *sorted.get(upper)?;

    Some(low + (high - low) * (rank - lower as f64))
}

/// Absolute price ceiling for a holding window
///
/// Near the deadline (or when never balanced) the more permissive economic ceiling applies.
pub fn absolute_price_threshold(config: &BalancingConfig, days_since_last: Option<f64>) -> f64 {
    let deadline_near = days_since_last
        .is_none_or(|days| days >= f64::from(config.cycle_days) - DEADLINE_APPROACH_DAYS);

    if deadline_near {
        config.economic_price_threshold
    } else {
        config.opportunistic_price_threshold
    }
}

/// Average price a window may have to be considered cheap
pub fn cheap_price_threshold(
    future_prices: &[f64],
    config: &BalancingConfig,
    days_since_last: Option<f64>,
) -> f64 {
    let absolute = absolute_price_threshold(config, days_since_last);
    percentile(future_prices, config.cheap_window_percentile)
        .map_or(absolute, |p| p.min(absolute))
}

/// Sliding-window search for the cheapest holding start
#[derive(Debug, Clone, Copy)]
pub struct WindowSearch<'a> {
    cost_model: &'a CostModel<'a>,
    config: &'a BalancingConfig,
    days_since_last: Option<f64>,
}

impl<'a> WindowSearch<'a> {
    pub fn new(
        cost_model: &'a CostModel<'a>,
        config: &'a BalancingConfig,
        days_since_last: Option<f64>,
    ) -> Self {
        Self {
            cost_model,
            config,
            days_since_last,
        }
    }

    /// Find the holding window start cheaper than charging now
    ///
    /// Returns `(None, immediate_cost)` when no window beats it; the returned
    /// cost is never above `immediate_cost`.
    pub fn select_best_window(
        &self,
        prices: &[PricePoint],
        immediate_cost: f64,
        holding_hours: u32,
        current_soc_kwh: f64,
    ) -> (Option<DateTime<Utc>>, f64) {
        let now = self.cost_model.now();
        let horizon = now + Duration::hours(SEARCH_HORIZON_HOURS);

        // The cheap threshold looks at every known future price, not just the horizon
        let future_prices: Vec<f64> = prices
            .iter()
            .filter(|p| p.timestamp > now)
            .map(|p| p.price_czk_per_kwh)
            .collect();

        let mut future: Vec<PricePoint> = prices
            .iter()
            .filter(|p| p.timestamp > now && p.timestamp <= horizon)
            .copied()
            .collect();
        future.sort_by_key(|p| p.timestamp);

        let window_len = holding_hours as usize * 4;
        if window_len == 0 || future.len() < window_len {
            debug!(
                "Window search: {} future prices, need {window_len}",
                future.len()
            );
            return (None, immediate_cost);
        }

        let threshold = cheap_price_threshold(&future_prices, self.config, self.days_since_last);
        debug!(
            "Window search: {} candidates, cheap threshold {threshold:.3} CZK/kWh",
            future.len() - window_len + 1
        );

        let mut best_start = None;
        let mut best_cost = immediate_cost;

        for window in future.windows(window_len) {
            let (Some(first), Some(last)) = (window.first(), window.last()) else {
                continue;
            };

            let span = last.timestamp - first.timestamp;
            if span != Duration::minutes(BLOCK_DURATION_MINUTES * (window_len as i64 - 1)) {
                trace!("Skipping window at {} with gaps", first.timestamp);
                continue;
            }

            let avg = window.iter().map(|p| p.price_czk_per_kwh).sum::<f64>() / window_len as f64;
            if avg > threshold {
                continue;
            }

            let cost = self
                .cost_model
                .total_delayed_cost(first.timestamp, current_soc_kwh);
            if cost < best_cost {
                best_cost = cost;
                best_start = Some(first.timestamp);
            }
        }

        (best_start, best_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancing::cost::IMMEDIATE_COST_SENTINEL;
    use crate::battery::BatteryModel;
    use balancer_types::{BatteryConfig, ForecastPoint, ForecastTimeline};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn timeline(prices: &[f64]) -> ForecastTimeline {
        ForecastTimeline::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, price)| ForecastPoint {
                    timestamp: base() + Duration::minutes(15 * i as i64),
                    spot_price: *price,
                    solar_kwh: 0.0,
                    load_kwh: 0.1,
                    grid_import_kwh: 0.0,
                    battery_soc_kwh: 8.0,
                })
                .collect(),
        )
    }

    fn battery() -> BatteryModel {
        BatteryModel::from_config(&BatteryConfig::default(), 10.0)
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
        assert!((percentile(&values, 50.0).unwrap() - 2.5).abs() < 1e-9);
        assert!((percentile(&values, 30.0).unwrap() - 1.9).abs() < 1e-9);
        assert_eq!(percentile(&[], 30.0), None);
        assert_eq!(percentile(&[7.0], 30.0), Some(7.0));
    }

    #[test]
    fn test_threshold_switches_near_deadline() {
        let config = BalancingConfig::default();
        assert!((absolute_price_threshold(&config, Some(2.0)) - 1.1).abs() < 1e-9);
        assert!((absolute_price_threshold(&config, Some(5.0)) - 2.5).abs() < 1e-9);
        assert!((absolute_price_threshold(&config, None) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_cheap_threshold_takes_minimum() {
        let config = BalancingConfig::default();
        let prices = [0.5, 0.6, 0.7, 3.0, 4.0, 5.0];
        let threshold = cheap_price_threshold(&prices, &config, Some(1.0));
        assert!((threshold - 0.65).abs() < 1e-9);

        let expensive = [3.0, 4.0, 5.0];
        let threshold = cheap_price_threshold(&expensive, &config, Some(1.0));
        assert!((threshold - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_selects_cheapest_window() {
        // 2h expensive, 3h cheap, 3h expensive
        let mut prices = vec![4.0; 8];
        prices.extend(vec![0.5; 12]);
        prices.extend(vec![4.0; 12]);
        let timeline = timeline(&prices);
        let battery = battery();
        let model = CostModel::new(&timeline, &battery, Duration::hours(3), base());
        let config = BalancingConfig::default();
        let search = WindowSearch::new(&model, &config, Some(1.0));

        let immediate = model.immediate_cost(8.0);
        let (start, cost) = search.select_best_window(&timeline.price_points(), immediate, 3, 8.0);

        assert_eq!(start, Some(base() + Duration::hours(2)));
        assert!(cost < immediate);
    }

    #[test]
    fn test_no_window_beats_immediate() {
        let timeline = timeline(&[0.2; 32]);
        let battery = battery();
        let model = CostModel::new(&timeline, &battery, Duration::hours(3), base());
        let config = BalancingConfig::default();
        let search = WindowSearch::new(&model, &config, Some(1.0));

        // Charging now costs nothing extra when the battery is already full
        let (start, cost) = search.select_best_window(&timeline.price_points(), 0.0, 3, 10.0);
        assert_eq!(start, None);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_windows_with_gaps_are_skipped() {
        let mut points: Vec<ForecastPoint> = timeline(&[0.5; 16]).points().to_vec();
        // Move the last 8 blocks one hour later, leaving a hole in the middle
        for point in points.iter_mut().skip(8) {
            point.timestamp += Duration::hours(1);
        }
        let timeline = ForecastTimeline::new(points);
        let battery = battery();
        let model = CostModel::new(&timeline, &battery, Duration::hours(3), base());
        let config = BalancingConfig::default();
        let search = WindowSearch::new(&model, &config, Some(1.0));

        let (start, cost) =
            search.select_best_window(&timeline.price_points(), IMMEDIATE_COST_SENTINEL, 3, 8.0);
        assert_eq!(start, None);
        assert_eq!(cost, IMMEDIATE_COST_SENTINEL);
    }

    #[test]
    fn test_threshold_uses_prices_beyond_horizon() {
        // Expensive hour, moderate prices up to the horizon, then two cheap days
        let mut prices = vec![4.0; 4];
        prices.extend(vec![0.8; 188]);
        prices.extend(vec![0.1; 192]);
        let timeline = timeline(&prices);
        let battery = battery();
        let model = CostModel::new(&timeline, &battery, Duration::hours(3), base());
        let config = BalancingConfig::default();
        let search = WindowSearch::new(&model, &config, Some(1.0));

        let immediate = model.immediate_cost(8.0);
        let (start, cost) = search.select_best_window(&timeline.price_points(), immediate, 3, 8.0);

        // 0.8 windows are not cheap compared to the whole forecast
        assert_eq!(start, None);
        assert_eq!(cost, immediate);
    }

    #[test]
    fn test_cost_never_exceeds_immediate() {
        let prices: Vec<f64> = (0..96).map(|i| 0.3 + f64::from(i % 7) * 0.4).collect();
        let timeline = timeline(&prices);
        let battery = battery();
        let config = BalancingConfig::default();

        for offset_blocks in [0, 5, 40] {
            let now = base() + Duration::minutes(15 * offset_blocks);
            let model = CostModel::new(&timeline, &battery, Duration::hours(3), now);
            let search = WindowSearch::new(&model, &config, Some(6.0));

            for immediate in [0.0, 0.5, 3.0, model.immediate_cost(7.0)] {
                let (_, cost) =
                    search.select_best_window(&timeline.price_points(), immediate, 3, 7.0);
                assert!(cost <= immediate);
            }
        }
    }
}
