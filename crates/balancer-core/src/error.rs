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

//! Error types for the balancing core

use thiserror::Error;

/// Failure of a statistics history query
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The recorder backend is not ready yet (startup, reconnect); retry next cycle
    #[error("history backend unavailable: {0}")]
    Unavailable(String),

    #[error("history query failed: {0}")]
    Query(String),
}

impl HistoryError {
    /// Transient errors are expected and skip the cycle silently
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Service-level failures
#[derive(Debug, Error)]
pub enum BalancingError {
    #[error("balancing service is not running")]
    ServiceStopped,
}

pub type Result<T> = std::result::Result<T, BalancingError>;
