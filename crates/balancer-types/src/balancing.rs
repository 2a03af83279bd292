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

//! Battery balancing types.
//!
//! This module provides types for:
//! - The reason a balancing plan exists (natural, opportunistic, forced)
//! - The plan itself (holding window plus the interval-by-interval dispatch)
//! - The persisted state document and the read-only snapshot exposed to consumers

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inverter::DispatchMode;

// ============= Modes & States =============

/// Why a balancing plan was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancingMode {
    /// The dispatch forecast already holds the battery full, no extra cost
    Natural,
    /// A cheap price window was found while the battery is already high
    Opportunistic,
    /// The balancing deadline has been reached, cost is secondary
    Forced,
}

impl BalancingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Opportunistic => "opportunistic",
            Self::Forced => "forced",
        }
    }

    /// Default priority for plans of this mode
    pub fn priority(&self) -> PlanPriority {
        match self {
            Self::Natural => PlanPriority::Low,
            Self::Opportunistic => PlanPriority::Normal,
            Self::Forced => PlanPriority::Critical,
        }
    }
}

impl fmt::Display for BalancingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority the downstream executor should give a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanPriority {
    Low,
    Normal,
    Critical,
}

/// Exposed balancing state tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BalancingState {
    #[default]
    Idle,
    Natural,
    Opportunistic,
    Forced,
    /// No active plan and the cycle deadline has passed (derived, never persisted)
    Overdue,
}

impl BalancingState {
    /// Derive the state tag from the active plan and the time since the last balancing
    ///
    /// `days_since_last` of `None` means the battery has never been balanced.
    pub fn derive(
        active_plan: Option<&BalancingPlan>,
        days_since_last: Option<f64>,
        cycle_days: u32,
    ) -> Self {
        if let Some(plan) = active_plan {
            return match plan.mode {
                BalancingMode::Natural => Self::Natural,
                BalancingMode::Opportunistic => Self::Opportunistic,
                BalancingMode::Forced => Self::Forced,
            };
        }

        match days_since_last {
            Some(days) if days < f64::from(cycle_days) => Self::Idle,
            _ => Self::Overdue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Natural => "natural",
            Self::Opportunistic => "opportunistic",
            Self::Forced => "forced",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for BalancingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============= Plan =============

/// One 15-minute step of a balancing plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancingInterval {
    pub timestamp: DateTime<Utc>,
    pub dispatch_mode: DispatchMode,
}

/// A concrete balancing plan: charging ramp followed by a holding block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingPlan {
    pub mode: BalancingMode,

    /// When this plan was created
    pub created_at: DateTime<Utc>,

    /// Human-readable reason (for logging and UI)
    pub reason: String,

    /// Start of the window in which the battery is held at 100%
    pub holding_start: DateTime<Utc>,

    /// End of the holding window (exclusive)
    pub holding_end: DateTime<Utc>,

    /// Ramp-up plus holding intervals, strictly increasing, 15 minutes apart
    #[serde(default)]
    pub intervals: Vec<BalancingInterval>,

    /// Locked plans must not be replaced by the executor's own optimization
    #[serde(default)]
    pub locked: bool,

    pub priority: PlanPriority,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl BalancingPlan {
    /// Check if `now` falls inside the holding window
    pub fn is_holding(&self, now: DateTime<Utc>) -> bool {
        now >= self.holding_start && now < self.holding_end
    }

    /// Check if the holding window has fully elapsed
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.holding_end
    }

    /// Check if the holding window has not started yet
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        now < self.holding_start
    }

    pub fn holding_duration(&self) -> Duration {
        self.holding_end - self.holding_start
    }

    /// Dispatch mode planned for the interval starting at `timestamp`
    pub fn mode_at(&self, timestamp: DateTime<Utc>) -> Option<DispatchMode> {
        self.intervals
            .iter()
            .find(|i| i.timestamp == timestamp)
            .map(|i| i.dispatch_mode)
    }
}

// ============= Telemetry =============

/// Cost telemetry of the last planning decision (CZK)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BalancingCosts {
    pub immediate_cost: f64,
    pub selected_cost: f64,
    pub savings: f64,
}

impl BalancingCosts {
    pub fn new(immediate_cost: f64, selected_cost: f64) -> Self {
        Self {
            immediate_cost,
            selected_cost,
            savings: immediate_cost - selected_cost,
        }
    }
}

// ============= Persistence & Snapshot =============

/// Balancing state document - persisted to ./data/battery_balancing.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedBalancingState {
    /// When the last completed balancing cycle ended
    #[serde(default)]
    pub last_balancing_ts: Option<DateTime<Utc>>,

    /// Plan currently owned by the balancer
    #[serde(default)]
    pub active_plan: Option<BalancingPlan>,

    /// When the last plan was created
    #[serde(default)]
    pub last_plan_ts: Option<DateTime<Utc>>,

    /// Mode of the last plan that was created
    #[serde(default)]
    pub last_plan_mode: Option<BalancingMode>,
}

impl PersistedBalancingState {
    /// Fractional days since the last completed balancing
    pub fn days_since_last(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_balancing_ts
            .map(|ts| (now - ts).num_seconds() as f64 / 86_400.0)
    }
}

/// Immutable read model of the balancer, published after every check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingSnapshot {
    pub state: BalancingState,
    pub active_plan: Option<BalancingPlan>,
    pub last_balancing_ts: Option<DateTime<Utc>>,
    pub last_plan_ts: Option<DateTime<Utc>>,
    pub days_since_last: Option<f64>,
    pub costs: Option<BalancingCosts>,
    pub updated_at: DateTime<Utc>,
}

impl Default for BalancingSnapshot {
    fn default() -> Self {
        Self {
            state: BalancingState::Idle,
            active_plan: None,
            last_balancing_ts: None,
            last_plan_ts: None,
            days_since_last: None,
            costs: None,
            updated_at: Utc::now(),
        }
    }
}
