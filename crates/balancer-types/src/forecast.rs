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

//! Forecast timeline produced by the downstream dispatch planner.
//!
//! Every record covers one 15-minute block. Prices are CZK/kWh, energies kWh per block.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Block duration used by the price feed and the dispatch planner
pub const BLOCK_DURATION_MINUTES: i64 = 15;

/// A single 15-minute forecast record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Start time of this block
    pub timestamp: DateTime<Utc>,

    /// Spot import price for this block (CZK/kWh)
    pub spot_price: f64,

    /// Forecast solar production (kWh)
    #[serde(default)]
    pub solar_kwh: f64,

    /// Forecast household consumption (kWh)
    #[serde(default)]
    pub load_kwh: f64,

    /// Grid import the dispatch plan expects (kWh)
    #[serde(default)]
    pub grid_import_kwh: f64,

    /// Battery energy at the end of the block according to the dispatch plan (kWh)
    #[serde(default)]
    pub battery_soc_kwh: f64,
}

/// A price for one 15-minute block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price_czk_per_kwh: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price_czk_per_kwh: f64) -> Self {
        Self {
            timestamp,
            price_czk_per_kwh,
        }
    }
}

/// Ordered forecast records (oldest first)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastTimeline {
    points: Vec<ForecastPoint>,
}

impl ForecastTimeline {
    /// Create a timeline, sorting the records by timestamp
    pub fn new(mut points: Vec<ForecastPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Records strictly after `now`
    pub fn future_from(&self, now: DateTime<Utc>) -> &[ForecastPoint] {
        let idx = self.points.partition_point(|p| p.timestamp <= now);
        &self.points[idx..]
    }

    /// Records with `start <= timestamp < end`
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[ForecastPoint] {
        let from = self.points.partition_point(|p| p.timestamp < start);
        let to = self.points.partition_point(|p| p.timestamp < end).max(from);
        &self.points[from..to]
    }

    /// Price series extracted from the forecast
    pub fn price_points(&self) -> Vec<PricePoint> {
        self.points
            .iter()
            .map(|p| PricePoint::new(p.timestamp, p.spot_price))
            .collect()
    }

    /// Spot price of the record closest to `at`, if one lies within `tolerance`
    pub fn nearest_price(&self, at: DateTime<Utc>, tolerance: Duration) -> Option<f64> {
        self.points
            .iter()
            .map(|p| ((p.timestamp - at).abs(), p.spot_price))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, price)| price)
    }

    /// Mean spot price over `[start, end)`
    pub fn average_price(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        let slice = self.between(start, end);
        if slice.is_empty() {
            return None;
        }
        Some(slice.iter().map(|p| p.spot_price).sum::<f64>() / slice.len() as f64)
    }

    /// Total grid import the dispatch plan expects over `[start, end)`
    pub fn grid_import_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        self.between(start, end)
            .iter()
            .map(|p| p.grid_import_kwh.max(0.0))
            .sum()
    }
}

impl From<Vec<ForecastPoint>> for ForecastTimeline {
    fn from(points: Vec<ForecastPoint>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(minutes: i64, price: f64) -> ForecastPoint {
        ForecastPoint {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            spot_price: price,
            solar_kwh: 0.0,
            load_kwh: 0.1,
            grid_import_kwh: 0.1,
            battery_soc_kwh: 5.0,
        }
    }

    #[test]
    fn test_new_sorts_points() {
        let timeline = ForecastTimeline::new(vec![point(30, 3.0), point(0, 1.0), point(15, 2.0)]);
        let prices: Vec<f64> = timeline.points().iter().map(|p| p.spot_price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_future_from_is_strict() {
        let timeline = ForecastTimeline::new(vec![point(0, 1.0), point(15, 2.0), point(30, 3.0)]);
        let now = timeline.points()[1].timestamp;
        let future = timeline.future_from(now);
        assert_eq!(future.len(), 1);
        assert_eq!(future[0].spot_price, 3.0);
    }

    #[test]
    fn test_nearest_price_respects_tolerance() {
        let timeline = ForecastTimeline::new(vec![point(0, 1.0), point(15, 2.0)]);
        let base = timeline.points()[0].timestamp;

        assert_eq!(
            timeline.nearest_price(base + Duration::minutes(10), Duration::hours(1)),
            Some(2.0)
        );
        assert_eq!(
            timeline.nearest_price(base + Duration::hours(3), Duration::hours(1)),
            None
        );
    }

    #[test]
    fn test_average_price_half_open() {
        let timeline = ForecastTimeline::new(vec![point(0, 1.0), point(15, 2.0), point(30, 6.0)]);
        let base = timeline.points()[0].timestamp;

        let avg = timeline
            .average_price(base, base + Duration::minutes(30))
            .unwrap();
        assert!((avg - 1.5).abs() < 1e-9);
        assert!(timeline.average_price(base, base).is_none());
    }

    #[test]
    fn test_grid_import_between() {
        let timeline = ForecastTimeline::new(vec![point(0, 1.0), point(15, 2.0), point(30, 6.0)]);
        let base = timeline.points()[0].timestamp;
        let total = timeline.grid_import_between(base, base + Duration::minutes(30));
        assert!((total - 0.2).abs() < 1e-9);
    }
}
