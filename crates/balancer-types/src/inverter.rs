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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= Dispatch Modes =============

/// Battery dispatch modes (vendor-agnostic)
/// Exactly one mode is in effect for every 15-minute interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DispatchMode {
    /// Solar covers load first, battery covers the deficit, grid the remainder
    #[default]
    GridPriority,
    /// Solar surplus charges the battery, but a deficit is always taken from the grid
    /// The battery is never discharged in this mode
    BatteryPriority,
    /// All solar goes to the battery, load is always served from the grid
    SolarPriority,
    /// Charge from solar and grid until full (UPS mode)
    FullCharge,
}

impl DispatchMode {
    /// Get human-readable name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GridPriority => "Grid Priority",
            Self::BatteryPriority => "Battery Priority",
            Self::SolarPriority => "Solar Priority",
            Self::FullCharge => "Full Charge (UPS)",
        }
    }

    /// Get config string value (kebab-case)
    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::GridPriority => "grid-priority",
            Self::BatteryPriority => "battery-priority",
            Self::SolarPriority => "solar-priority",
            Self::FullCharge => "full-charge",
        }
    }

    /// List all dispatch modes
    pub fn all() -> &'static [DispatchMode] {
        &[
            Self::GridPriority,
            Self::BatteryPriority,
            Self::SolarPriority,
            Self::FullCharge,
        ]
    }

    /// True for the modes that share the night-time behaviour (everything but UPS)
    pub fn is_self_consumption(&self) -> bool {
        match self {
            Self::GridPriority | Self::BatteryPriority | Self::SolarPriority => true,
            Self::FullCharge => false,
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "grid-priority" | "gridpriority" => Ok(Self::GridPriority),
            "battery-priority" | "batterypriority" => Ok(Self::BatteryPriority),
            "solar-priority" | "solarpriority" => Ok(Self::SolarPriority),
            "full-charge" | "fullcharge" | "ups" => Ok(Self::FullCharge),
            _ => Err(anyhow::anyhow!(
                "Unknown dispatch mode: '{}'. Supported modes: {}",
                s,
                Self::all()
                    .iter()
                    .map(|m| m.to_config_value())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_values() {
        for mode in DispatchMode::all() {
            let parsed: DispatchMode = mode.to_config_value().parse().unwrap();
            assert_eq!(parsed, *mode);
        }
        assert_eq!(
            "FULL_CHARGE".parse::<DispatchMode>().unwrap(),
            DispatchMode::FullCharge
        );
        assert_eq!("ups".parse::<DispatchMode>().unwrap(), DispatchMode::FullCharge);
    }

    #[test]
    fn test_parse_unknown_mode_lists_supported() {
        let err = "home-3".parse::<DispatchMode>().unwrap_err().to_string();
        assert!(err.contains("home-3"));
        assert!(err.contains("battery-priority"));
    }

    #[test]
    fn test_self_consumption_modes() {
        assert!(DispatchMode::GridPriority.is_self_consumption());
        assert!(DispatchMode::BatteryPriority.is_self_consumption());
        assert!(DispatchMode::SolarPriority.is_self_consumption());
        assert!(!DispatchMode::FullCharge.is_self_consumption());
    }
}
