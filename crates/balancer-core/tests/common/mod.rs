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

//! In-memory data sources and store shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use balancer_core::{
    BalancingManager, BalancingSources, BalancingStore, BatteryStateSource, EventPublisher,
    ForecastDataSource, HistoryError, SocHistorySource,
};
use balancer_types::{
    BalancingConfig, BatteryConfig, BatteryReading, ForecastPoint, ForecastTimeline,
    PersistedBalancingState, SocStatistic,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

pub const CAPACITY_KWH: f64 = 10.0;

/// Aligned reference time used by most tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn battery_config() -> BatteryConfig {
    BatteryConfig {
        capacity_kwh: CAPACITY_KWH,
        ..BatteryConfig::default()
    }
}

/// 15-minute forecast starting at `start`, one point per price
pub fn forecast(start: DateTime<Utc>, prices: &[f64], battery_soc_kwh: f64) -> ForecastTimeline {
    ForecastTimeline::new(
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| ForecastPoint {
                timestamp: start + Duration::minutes(15 * i as i64),
                spot_price: *price,
                solar_kwh: 0.0,
                load_kwh: 0.2,
                grid_import_kwh: 0.0,
                battery_soc_kwh,
            })
            .collect(),
    )
}

/// Hourly statistics at 100% ending at `end`
pub fn full_hours(end: DateTime<Utc>, hours: i64) -> Vec<SocStatistic> {
    (0..hours)
        .map(|h| SocStatistic {
            start: end - Duration::hours(hours - h),
            mean: Some(99.8),
            max: Some(100.0),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct FakeBattery {
    reading: Mutex<Option<BatteryReading>>,
}

impl FakeBattery {
    pub fn set_soc(&self, soc_percent: f64) {
        *self.reading.lock() = Some(BatteryReading {
            soc_percent,
            capacity_kwh: Some(CAPACITY_KWH),
        });
    }

    pub fn clear(&self) {
        *self.reading.lock() = None;
    }
}

#[async_trait]
impl BatteryStateSource for FakeBattery {
    async fn read_battery(&self) -> Result<Option<BatteryReading>> {
        Ok(*self.reading.lock())
    }

    fn name(&self) -> &str {
        "fake-battery"
    }
}

#[derive(Debug, Default)]
pub struct FakeForecast {
    timeline: Mutex<ForecastTimeline>,
}

impl FakeForecast {
    pub fn set(&self, timeline: ForecastTimeline) {
        *self.timeline.lock() = timeline;
    }
}

#[async_trait]
impl ForecastDataSource for FakeForecast {
    async fn read_forecast(&self) -> Result<ForecastTimeline> {
        Ok(self.timeline.lock().clone())
    }

    fn name(&self) -> &str {
        "fake-forecast"
    }
}

#[derive(Debug, Clone, Default)]
pub enum HistoryResponse {
    #[default]
    Empty,
    Stats(Vec<SocStatistic>),
    Unavailable,
    Broken,
}

#[derive(Debug, Default)]
pub struct FakeHistory {
    response: Mutex<HistoryResponse>,
    queries: AtomicUsize,
}

impl FakeHistory {
    pub fn set(&self, response: HistoryResponse) {
        *self.response.lock() = response;
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocHistorySource for FakeHistory {
    async fn hourly_soc_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<SocStatistic>, HistoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.response.lock().clone() {
            HistoryResponse::Empty => Ok(Vec::new()),
            HistoryResponse::Stats(stats) => Ok(stats
                .into_iter()
                .filter(|s| s.start >= start && s.start < end)
                .collect()),
            HistoryResponse::Unavailable => {
                Err(HistoryError::Unavailable("recorder starting".to_owned()))
            }
            HistoryResponse::Broken => Err(HistoryError::Query("unknown statistic".to_owned())),
        }
    }

    fn name(&self) -> &str {
        "fake-history"
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedBalancingState>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with_state(state: PersistedBalancingState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> PersistedBalancingState {
        self.state.lock().clone()
    }
}

impl BalancingStore for MemoryStore {
    fn load(&self) -> Result<PersistedBalancingState> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PersistedBalancingState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("read-only file system");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = state.clone();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Fakes wired together, ready to build a manager
#[derive(Debug)]
pub struct Harness {
    pub battery: Arc<FakeBattery>,
    pub forecast: Arc<FakeForecast>,
    pub history: Arc<FakeHistory>,
    pub store: Arc<MemoryStore>,
    pub events: EventPublisher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(PersistedBalancingState::default())
    }

    pub fn with_state(state: PersistedBalancingState) -> Self {
        let battery = Arc::new(FakeBattery::default());
        battery.set_soc(50.0);

        Self {
            battery,
            forecast: Arc::new(FakeForecast::default()),
            history: Arc::new(FakeHistory::default()),
            store: Arc::new(MemoryStore::with_state(state)),
            events: EventPublisher::new(),
        }
    }

    /// State with a balancing `days` before `t0()`
    pub fn balanced_days_ago(days: f64) -> Self {
        Self::with_state(PersistedBalancingState {
            last_balancing_ts: Some(t0() - Duration::seconds((days * 86_400.0) as i64)),
            ..PersistedBalancingState::default()
        })
    }

    pub fn sources(&self) -> BalancingSources {
        BalancingSources {
            battery: self.battery.clone(),
            forecast: self.forecast.clone(),
            history: self.history.clone(),
        }
    }

    pub fn manager(&self) -> BalancingManager {
        self.manager_with(BalancingConfig::default())
    }

    pub fn manager_with(&self, config: BalancingConfig) -> BalancingManager {
        BalancingManager::new(
            config,
            battery_config(),
            self.sources(),
            self.store.clone(),
            self.events.clone(),
        )
    }
}
