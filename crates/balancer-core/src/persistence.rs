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

//! Persistence layer for balancing state.
//!
//! Handles loading and saving of `PersistedBalancingState` to/from disk.

use anyhow::{Context, Result};
use balancer_types::PersistedBalancingState;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default path for the balancing state file.
/// Uses relative path for portability (works in both dev and HA addon).
pub const DEFAULT_BALANCING_STATE_PATH: &str = "./data/battery_balancing.json";

/// Durable storage for the balancing state document.
///
/// Calls are blocking; the balancer invokes `save` through `spawn_blocking`.
pub trait BalancingStore: Send + Sync {
    fn load(&self) -> Result<PersistedBalancingState>;

    fn save(&self, state: &PersistedBalancingState) -> Result<()>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// JSON file store with atomic writes.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Path to balancing state file.
    state_path: PathBuf,
}

impl JsonFileStore {
    /// Create a new store with the given path.
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

}

impl BalancingStore for JsonFileStore {
    /// Load balancing state from disk.
    ///
    /// Returns the default state if the file doesn't exist.
    fn load(&self) -> Result<PersistedBalancingState> {
        if !self.state_path.exists() {
            info!(
                "Balancing state file not found at {}, starting fresh",
                self.state_path.display()
            );
            return Ok(PersistedBalancingState::default());
        }

        let contents = fs::read_to_string(&self.state_path).with_context(|| {
            format!(
                "Failed to read balancing state from {}",
                self.state_path.display()
            )
        })?;

        let state: PersistedBalancingState =
            serde_json::from_str(&contents).with_context(|| {
                format!(
                    "Failed to parse balancing state from {}",
                    self.state_path.display()
                )
            })?;

        info!(
            "Loaded balancing state: last_balancing={:?}, active_plan={}, last_plan_mode={:?}",
            state.last_balancing_ts,
            state
                .active_plan
                .as_ref()
                .map_or("none", |p| p.mode.as_str()),
            state.last_plan_mode
        );

        Ok(state)
    }

    /// Save balancing state to disk.
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn save(&self, state: &PersistedBalancingState) -> Result<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(state).context("Failed to serialize balancing state")?;

        let temp_path = self.state_path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.state_path).with_context(|| {
            format!(
                "Failed to rename temp file to {}",
                self.state_path.display()
            )
        })?;

        debug!("Saved balancing state to {}", self.state_path.display());

        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}
