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

//! File-backed data sources
//!
//! The planner, the recorder export and the BMS bridge each drop a JSON document on
//! disk. These adapters read them on every check so the balancer always sees the
//! latest data without holding any file open.

use anyhow::{Context, Result};
use async_trait::async_trait;
use balancer_core::{BatteryStateSource, ForecastDataSource, HistoryError, SocHistorySource};
use balancer_types::{BatteryReading, ForecastPoint, ForecastTimeline, SocStatistic};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a file, mapping "not found" to `None`
async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Current battery reading from a JSON document
///
/// ```json
/// {"soc_percent": 87.0, "capacity_kwh": 12.29}
/// ```
#[derive(Debug, Clone)]
pub struct FileBatterySource {
    path: PathBuf,
}

impl FileBatterySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BatteryStateSource for FileBatterySource {
    async fn read_battery(&self) -> Result<Option<BatteryReading>> {
        let Some(contents) = read_optional(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?
        else {
            debug!("🔋 No battery reading at {}", self.path.display());
            return Ok(None);
        };

        let reading: BatteryReading = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse battery reading {}", self.path.display()))?;

        if !reading.soc_percent.is_finite() {
            return Ok(None);
        }

        debug!("🔋 Battery SOC {:.1}%", reading.soc_percent);
        Ok(Some(reading))
    }

    fn name(&self) -> &str {
        "battery-file"
    }
}

/// Dispatch forecast from a JSON array of 15-minute records
#[derive(Debug, Clone)]
pub struct FileForecastSource {
    path: PathBuf,
}

impl FileForecastSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ForecastDataSource for FileForecastSource {
    async fn read_forecast(&self) -> Result<ForecastTimeline> {
        let Some(contents) = read_optional(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?
        else {
            debug!("📈 No forecast at {}", self.path.display());
            return Ok(ForecastTimeline::default());
        };

        let points: Vec<ForecastPoint> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse forecast {}", self.path.display()))?;

        info!("📈 Loaded {} forecast blocks", points.len());
        Ok(ForecastTimeline::new(points))
    }

    fn name(&self) -> &str {
        "forecast-file"
    }
}

/// Hourly SOC statistics exported from the recorder
#[derive(Debug, Clone)]
pub struct FileHistorySource {
    path: PathBuf,
}

impl FileHistorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SocHistorySource for FileHistorySource {
    async fn hourly_soc_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<SocStatistic>, HistoryError> {
        let contents = read_optional(&self.path)
            .await
            .map_err(|e| HistoryError::Query(format!("{}: {e}", self.path.display())))?
            .ok_or_else(|| {
                HistoryError::Unavailable(format!("{} does not exist", self.path.display()))
            })?;

        let stats: Vec<SocStatistic> = serde_json::from_str(&contents)
            .map_err(|e| HistoryError::Query(format!("{}: {e}", self.path.display())))?;

        Ok(stats
            .into_iter()
            .filter(|s| s.start >= start && s.start < end)
            .collect())
    }

    fn name(&self) -> &str {
        "statistics-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_battery_file() {
        let dir = tempdir().unwrap();
        let source = FileBatterySource::new(dir.path().join("battery.json"));

        assert!(source.read_battery().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_battery_reading() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("battery.json");
        std::fs::write(&path, r#"{"soc_percent": 91.5}"#).unwrap();

        let reading = FileBatterySource::new(&path)
            .read_battery()
            .await
            .unwrap()
            .unwrap();

        assert!((reading.soc_percent - 91.5).abs() < 1e-9);
        assert!(reading.capacity_kwh.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_battery_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("battery.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileBatterySource::new(&path).read_battery().await.is_err());
    }

    #[tokio::test]
    async fn test_forecast_is_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.json");
        std::fs::write(
            &path,
            r#"[
                {"timestamp": "2025-03-01T12:15:00Z", "spot_price": 2.0},
                {"timestamp": "2025-03-01T12:00:00Z", "spot_price": 1.5, "solar_kwh": 0.4}
            ]"#,
        )
        .unwrap();

        let timeline = FileForecastSource::new(&path).read_forecast().await.unwrap();

        assert_eq!(timeline.len(), 2);
        assert!((timeline.points()[0].spot_price - 1.5).abs() < 1e-9);
        assert!((timeline.points()[0].solar_kwh - 0.4).abs() < 1e-9);
        assert_eq!(timeline.points()[1].load_kwh, 0.0);
    }

    #[tokio::test]
    async fn test_missing_forecast_is_empty() {
        let dir = tempdir().unwrap();
        let timeline = FileForecastSource::new(dir.path().join("forecast.json"))
            .read_forecast()
            .await
            .unwrap();

        assert!(timeline.is_empty());
    }

    #[tokio::test]
    async fn test_history_missing_is_unavailable() {
        let dir = tempdir().unwrap();
        let source = FileHistorySource::new(dir.path().join("stats.json"));
        let now = Utc::now();

        let err = source
            .hourly_soc_statistics(now - Duration::hours(6), now)
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_history_is_filtered_by_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(
            &path,
            r#"[
                {"start": "2025-03-01T08:00:00Z", "max": 100.0},
                {"start": "2025-03-01T09:00:00Z", "mean": 99.4},
                {"start": "2025-03-01T10:00:00Z", "max": 96.0}
            ]"#,
        )
        .unwrap();

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let stats = FileHistorySource::new(&path)
            .hourly_soc_statistics(start, start + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].value(), Some(99.4));
    }

    #[tokio::test]
    async fn test_history_parse_error_is_query_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{").unwrap();

        let now = Utc::now();
        let err = FileHistorySource::new(&path)
            .hourly_soc_statistics(now - Duration::hours(1), now)
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::Query(_)));
    }
}
