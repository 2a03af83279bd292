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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hourly battery SOC statistic from the recorder (percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocStatistic {
    /// Start of the hour this statistic covers
    pub start: DateTime<Utc>,

    /// Mean SOC over the hour
    #[serde(default)]
    pub mean: Option<f64>,

    /// Maximum SOC over the hour
    #[serde(default)]
    pub max: Option<f64>,
}

impl SocStatistic {
    /// Representative SOC for the hour: max preferred, mean as fallback
    pub fn value(&self) -> Option<f64> {
        self.max.or(self.mean)
    }
}

/// Current battery reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// State of charge (0-100%)
    pub soc_percent: f64,

    /// Usable capacity reported by the BMS, if available (kWh)
    #[serde(default)]
    pub capacity_kwh: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_prefers_max() {
        let stat = SocStatistic {
            start: Utc::now(),
            mean: Some(97.0),
            max: Some(100.0),
        };
        assert_eq!(stat.value(), Some(100.0));
    }

    #[test]
    fn test_value_falls_back_to_mean() {
        let stat = SocStatistic {
            start: Utc::now(),
            mean: Some(99.5),
            max: None,
        };
        assert_eq!(stat.value(), Some(99.5));
    }
}
