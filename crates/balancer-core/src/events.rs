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

//! Balancing lifecycle events
//!
//! Published after the transition they describe. Delivery is fire-and-forget:
//! a lagging or missing subscriber never affects the balancer.

use balancer_types::BalancingPlan;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum BalancingEvent {
    /// A new plan became active
    PlanCreated(BalancingPlan),

    /// The active plan's holding window ended without a detected completion
    PlanExpired { holding_end: DateTime<Utc> },

    /// A completed balancing cycle was found in the SOC history
    BalancingCompleted { completed_at: DateTime<Utc> },
}

impl BalancingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlanCreated(_) => "plan_created",
            Self::PlanExpired { .. } => "plan_expired",
            Self::BalancingCompleted { .. } => "balancing_completed",
        }
    }
}

/// Sending side of the event channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<BalancingEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalancingEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BalancingEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!("No subscribers for balancing event {name}");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
