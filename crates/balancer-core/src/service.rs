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

//! Balancing service: runs the state machine in a single task.
//!
//! Every check goes through one command queue, so timer ticks and manual
//! requests never run concurrently. Consumers read the latest snapshot
//! without touching the state machine.

use std::sync::Arc;
use std::time::Duration;

use balancer_types::{BalancingPlan, BalancingSnapshot, BalancingState};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::balancing::BalancingManager;
use crate::error::{BalancingError, Result};
use crate::events::{BalancingEvent, EventPublisher};

const COMMAND_QUEUE_CAPACITY: usize = 16;

/// Default period between scheduled checks
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

enum Command {
    Check {
        force: bool,
        now: Option<DateTime<Utc>>,
        reply: oneshot::Sender<Option<BalancingPlan>>,
    },
}

#[derive(Debug)]
pub struct BalancingService;

impl BalancingService {
    /// Move the manager into its own task and return a handle to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(manager: BalancingManager) -> BalancingHandle {
        let (sender, mut receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let snapshot = Arc::new(RwLock::new(manager.snapshot(Utc::now())));
        let events = manager.events().clone();

        let published = Arc::clone(&snapshot);
        tokio::spawn(async move {
            let mut manager = manager;

            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Check { force, now, reply } => {
                        let now = now.unwrap_or_else(Utc::now);
                        let plan = manager.check_at(force, now).await;
                        *published.write() = manager.snapshot(now);

                        if reply.send(plan).is_err() {
                            debug!("Balancing check caller went away before the reply");
                        }
                    }
                }
            }

            info!("Balancing service stopped");
        });

        BalancingHandle {
            sender,
            snapshot,
            events,
        }
    }
}

/// Cloneable handle to a running [`BalancingService`]
#[derive(Clone)]
pub struct BalancingHandle {
    sender: mpsc::Sender<Command>,
    snapshot: Arc<RwLock<BalancingSnapshot>>,
    events: EventPublisher,
}

impl std::fmt::Debug for BalancingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancingHandle").finish_non_exhaustive()
    }
}

impl BalancingHandle {
    /// Queue a balancing check and wait for its result
    pub async fn check(&self, force: bool) -> Result<Option<BalancingPlan>> {
        self.send_check(force, None).await
    }

    /// Queue a balancing check evaluated at `now`
    pub async fn check_at(
        &self,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<BalancingPlan>> {
        self.send_check(force, Some(now)).await
    }

    async fn send_check(
        &self,
        force: bool,
        now: Option<DateTime<Utc>>,
    ) -> Result<Option<BalancingPlan>> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Command::Check { force, now, reply })
            .await
            .map_err(|_| BalancingError::ServiceStopped)?;

        response.await.map_err(|_| BalancingError::ServiceStopped)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> BalancingSnapshot {
        self.snapshot.read().clone()
    }

    pub fn state(&self) -> BalancingState {
        self.snapshot.read().state
    }

    pub fn active_plan(&self) -> Option<BalancingPlan> {
        self.snapshot.read().active_plan.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalancingEvent> {
        self.events.subscribe()
    }
}

/// Run a check every `period` until the service stops
pub fn spawn_periodic_checks(handle: BalancingHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match handle.check(false).await {
                Ok(Some(plan)) => debug!(
                    "Scheduled balancing check: {} plan, holding {} - {}",
                    plan.mode, plan.holding_start, plan.holding_end
                ),
                Ok(None) => debug!("Scheduled balancing check: no plan"),
                Err(BalancingError::ServiceStopped) => {
                    info!("Balancing service gone, stopping scheduled checks");
                    break;
                }
            }
        }
    })
}
