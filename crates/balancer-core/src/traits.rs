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

//! Data sources the balancer reads from
//!
//! Implementations live in the binary (file adapters) or in tests (in-memory fakes).

use anyhow::Result;
use async_trait::async_trait;
use balancer_types::{BatteryReading, ForecastTimeline, SocStatistic};
use chrono::{DateTime, Utc};

use crate::error::HistoryError;

/// Source of the current battery state
#[async_trait]
pub trait BatteryStateSource: Send + Sync {
    /// Read current SOC and capacity, `None` when the sensor has no value yet
    async fn read_battery(&self) -> Result<Option<BatteryReading>>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}

/// Source of the dispatch forecast timeline
#[async_trait]
pub trait ForecastDataSource: Send + Sync {
    /// Read the latest 15-minute forecast
    async fn read_forecast(&self) -> Result<ForecastTimeline>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}

/// Source of hourly SOC statistics
#[async_trait]
pub trait SocHistorySource: Send + Sync {
    /// Fetch hourly SOC statistics with `start <= hour < end`
    async fn hourly_soc_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<SocStatistic>, HistoryError>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}
