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

//! Detection of completed and naturally occurring balancing.

use balancer_types::{BLOCK_DURATION_MINUTES, ForecastPoint, SocStatistic};
use chrono::{DateTime, Duration, Utc};

/// SOC (percent) at which the battery counts as full for balancing
pub const BALANCED_SOC_PERCENT: f64 = 99.0;

/// A continuous run of full-battery hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullChargeRun {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FullChargeRun {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Find the most recent balancing visible in hourly SOC statistics
///
/// A run of consecutive hours at or above 99% qualifies once it lasts at least
/// `holding`. A run still in progress at `now` ends at `now`.
pub fn detect_completed_balancing(
    stats: &[SocStatistic],
    holding: Duration,
    now: DateTime<Utc>,
) -> Option<FullChargeRun> {
    let mut sorted: Vec<&SocStatistic> = stats.iter().filter(|s| s.start <= now).collect();
    sorted.sort_by_key(|s| s.start);

    let mut latest = None;
    let mut current: Option<FullChargeRun> = None;

    for stat in sorted {
        let hour_end = (stat.start + Duration::hours(1)).min(now);
        let full = stat.value().is_some_and(|v| v >= BALANCED_SOC_PERCENT);

        if !full {
            current = None;
            continue;
        }

        current = match current {
            Some(run) if run.end >= stat.start => Some(FullChargeRun {
                start: run.start,
                end: hour_end.max(run.end),
            }),
            _ => Some(FullChargeRun {
                start: stat.start,
                end: hour_end,
            }),
        };

        if let Some(run) = current
            && run.duration() >= holding
        {
            latest = Some(run);
        }
    }

    latest
}

/// Find the first future stretch where the dispatch plan already holds the battery full
///
/// Needs `blocks` consecutive 15-minute points at or above 99% of capacity.
pub fn detect_natural_window(
    future: &[ForecastPoint],
    capacity_kwh: f64,
    blocks: usize,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if blocks == 0 || capacity_kwh <= 0.0 {
        return None;
    }

    let full_level = capacity_kwh * BALANCED_SOC_PERCENT / 100.0;
    let step = Duration::minutes(BLOCK_DURATION_MINUTES);
    let mut run_start: Option<DateTime<Utc>> = None;
    let mut run_len = 0;
    let mut previous: Option<DateTime<Utc>> = None;

    for point in future {
        let contiguous = previous.is_some_and(|prev| point.timestamp - prev == step);
        previous = Some(point.timestamp);

        if point.battery_soc_kwh < full_level {
            run_start = None;
            run_len = 0;
            continue;
        }

        if run_start.is_none() || !contiguous {
            run_start = Some(point.timestamp);
            run_len = 0;
        }
        run_len += 1;

        if run_len >= blocks
            && let Some(start) = run_start
        {
            return Some((start, start + step * blocks as i32));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn stat(h: i64, max: Option<f64>, mean: Option<f64>) -> SocStatistic {
        SocStatistic {
            start: hour(h),
            mean,
            max,
        }
    }

    fn stats(values: &[f64]) -> Vec<SocStatistic> {
        values
            .iter()
            .enumerate()
            .map(|(h, v)| stat(h as i64, Some(*v), Some(*v - 2.0)))
            .collect()
    }

    #[test]
    fn test_completed_run_detected() {
        let history = stats(&[60.0, 90.0, 99.5, 100.0, 100.0, 80.0, 70.0]);
        let run = detect_completed_balancing(&history, Duration::hours(3), hour(7)).unwrap();

        assert_eq!(run.start, hour(2));
        assert_eq!(run.end, hour(5));
    }

    #[test]
    fn test_short_run_ignored() {
        let history = stats(&[60.0, 100.0, 100.0, 80.0]);
        assert!(detect_completed_balancing(&history, Duration::hours(3), hour(4)).is_none());
    }

    #[test]
    fn test_gap_breaks_run() {
        let history = vec![
            stat(0, Some(100.0), None),
            stat(1, Some(100.0), None),
            stat(3, Some(100.0), None),
        ];
        assert!(detect_completed_balancing(&history, Duration::hours(3), hour(4)).is_none());
    }

    #[test]
    fn test_ongoing_run_counts() {
        let history = stats(&[50.0, 100.0, 100.0, 100.0, 100.0]);
        let now = hour(4) + Duration::minutes(20);
        let run = detect_completed_balancing(&history, Duration::hours(3), now).unwrap();

        assert_eq!(run.start, hour(1));
        assert_eq!(run.end, now);
    }

    #[test]
    fn test_mean_fallback() {
        let history = vec![
            stat(0, None, Some(99.2)),
            stat(1, None, Some(99.6)),
            stat(2, None, Some(100.0)),
            stat(3, None, None),
        ];
        let run = detect_completed_balancing(&history, Duration::hours(3), hour(5)).unwrap();
        assert_eq!(run.end, hour(3));
    }

    #[test]
    fn test_most_recent_run_wins() {
        let history = stats(&[
            100.0, 100.0, 100.0, 50.0, 40.0, 100.0, 100.0, 100.0, 100.0, 60.0,
        ]);
        let run = detect_completed_balancing(&history, Duration::hours(3), hour(12)).unwrap();

        assert_eq!(run.start, hour(5));
        assert_eq!(run.end, hour(9));
    }

    fn forecast(socs: &[f64]) -> Vec<ForecastPoint> {
        socs.iter()
            .enumerate()
            .map(|(i, soc)| ForecastPoint {
                timestamp: hour(0) + Duration::minutes(15 * i as i64),
                spot_price: 2.0,
                solar_kwh: 1.0,
                load_kwh: 0.2,
                grid_import_kwh: 0.0,
                battery_soc_kwh: *soc,
            })
            .collect()
    }

    #[test]
    fn test_natural_window_found() {
        let mut socs = vec![8.0; 4];
        socs.extend(vec![9.95; 12]);
        socs.extend(vec![9.0; 4]);
        let window = detect_natural_window(&forecast(&socs), 10.0, 12).unwrap();

        assert_eq!(window.0, hour(1));
        assert_eq!(window.1, hour(4));
    }

    #[test]
    fn test_natural_window_too_short() {
        let mut socs = vec![9.95; 11];
        socs.push(9.5);
        socs.extend(vec![9.95; 11]);
        assert!(detect_natural_window(&forecast(&socs), 10.0, 12).is_none());
    }

    #[test]
    fn test_natural_window_requires_contiguous_points() {
        let mut points = forecast(&[10.0; 12]);
        for point in points.iter_mut().skip(6) {
            point.timestamp += Duration::hours(1);
        }
        assert!(detect_natural_window(&points, 10.0, 12).is_none());
    }
}
