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

//! Balancing state machine.
//!
//! Decides when the battery gets its periodic full charge and hold:
//! - Detects completed balancing from SOC history
//! - Keeps an active plan stable until its holding window ends
//! - Creates natural, forced, or opportunistic plans (in that precedence)

use std::fmt;
use std::sync::Arc;

use balancer_types::{
    BalancingConfig, BalancingCosts, BalancingMode, BalancingPlan, BalancingSnapshot,
    BalancingState, BatteryConfig, ForecastTimeline, PersistedBalancingState,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use super::cost::{CostModel, IMMEDIATE_COST_SENTINEL};
use super::detection::{detect_completed_balancing, detect_natural_window};
use super::plan::{PlanBuilder, PlanRequest};
use super::window::WindowSearch;
use crate::battery::BatteryModel;
use crate::events::{BalancingEvent, EventPublisher};
use crate::persistence::BalancingStore;
use crate::traits::{BatteryStateSource, ForecastDataSource, SocHistorySource};

/// Data sources read on every check
#[derive(Clone)]
pub struct BalancingSources {
    pub battery: Arc<dyn BatteryStateSource>,
    pub forecast: Arc<dyn ForecastDataSource>,
    pub history: Arc<dyn SocHistorySource>,
}

impl fmt::Debug for BalancingSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancingSources")
            .field("battery", &self.battery.name())
            .field("forecast", &self.forecast.name())
            .field("history", &self.history.name())
            .finish()
    }
}

/// Inputs resolved at the start of a check
struct CheckInputs {
    soc_percent: f64,
    soc_kwh: f64,
    battery: BatteryModel,
    timeline: ForecastTimeline,
}

enum CompletionOutcome {
    Completed(DateTime<Utc>),
    NotFound,
    /// History backend not ready, skip this cycle
    Skip,
}

/// A plan that passed the decision logic but is not active yet
struct Candidate {
    plan: BalancingPlan,
    costs: BalancingCosts,
}

/// Owns the balancing plan lifecycle
///
/// Not thread-safe by itself; [`crate::service::BalancingService`] serializes access.
pub struct BalancingManager {
    config: BalancingConfig,
    battery_config: BatteryConfig,
    sources: BalancingSources,
    store: Arc<dyn BalancingStore>,
    events: EventPublisher,
    state: PersistedBalancingState,
    costs: Option<BalancingCosts>,
}

impl fmt::Debug for BalancingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancingManager")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("store", &self.store.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BalancingManager {
    /// Create the manager, restoring persisted state from `store`
    ///
    /// An unreadable state file is logged and replaced by a fresh state.
    pub fn new(
        config: BalancingConfig,
        battery_config: BatteryConfig,
        sources: BalancingSources,
        store: Arc<dyn BalancingStore>,
        events: EventPublisher,
    ) -> Self {
        let state = store.load().unwrap_or_else(|e| {
            warn!(
                "⚠️ Could not load balancing state from {}: {e:#}, starting fresh",
                store.name()
            );
            PersistedBalancingState::default()
        });

        Self {
            config,
            battery_config: battery_config.sanitized(),
            sources,
            store,
            events,
            state,
            costs: None,
        }
    }

    pub fn config(&self) -> &BalancingConfig {
        &self.config
    }

    pub fn state(&self) -> &PersistedBalancingState {
        &self.state
    }

    pub fn costs(&self) -> Option<BalancingCosts> {
        self.costs
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Read model for consumers
    pub fn snapshot(&self, now: DateTime<Utc>) -> BalancingSnapshot {
        let days_since_last = self.state.days_since_last(now);
        BalancingSnapshot {
            state: BalancingState::derive(
                self.state.active_plan.as_ref(),
                days_since_last,
                self.config.cycle_days,
            ),
            active_plan: self.state.active_plan.clone(),
            last_balancing_ts: self.state.last_balancing_ts,
            last_plan_ts: self.state.last_plan_ts,
            days_since_last,
            costs: self.costs,
            updated_at: now,
        }
    }

    /// Run one balancing check against the wall clock
    pub async fn check(&mut self, force: bool) -> Option<BalancingPlan> {
        self.check_at(force, Utc::now()).await
    }

    /// Run one balancing check at `now`
    ///
    /// Returns the active plan, or `None` when no balancing is scheduled.
    pub async fn check_at(&mut self, force: bool, now: DateTime<Utc>) -> Option<BalancingPlan> {
        // Completion only needs SOC history, so it runs before the other inputs
        match self.detect_completion(now).await {
            CompletionOutcome::Completed(completed_at) => {
                self.record_completion(completed_at).await;
                return None;
            }
            CompletionOutcome::Skip => return None,
            CompletionOutcome::NotFound => {}
        }

        let inputs = self.read_inputs().await?;

        if let Some(plan) = self.state.active_plan.clone() {
            if plan.is_holding(now) {
                debug!(
                    "🔋 Holding battery at 100% ({} plan) until {}",
                    plan.mode, plan.holding_end
                );
                return Some(plan);
            }
            if plan.is_future(now) {
                debug!(
                    "🔋 {} balancing plan scheduled, holding starts {}",
                    plan.mode, plan.holding_start
                );
                return Some(plan);
            }

            info!(
                "⏱️ {} balancing plan expired at {} without confirmed completion",
                plan.mode, plan.holding_end
            );
            self.state.active_plan = None;
            self.costs = None;
            self.persist().await;
            self.events.publish(BalancingEvent::PlanExpired {
                holding_end: plan.holding_end,
            });
        }

        let candidate = if force {
            Some(self.forced_candidate(&inputs, now, "Manual balancing request".to_owned()))
        } else {
            self.evaluate(&inputs, now)
        }?;

        Some(self.activate(candidate, now).await)
    }

    async fn read_inputs(&self) -> Option<CheckInputs> {
        let reading = match self.sources.battery.read_battery().await {
            Ok(Some(reading)) if reading.soc_percent.is_finite() => reading,
            Ok(_) => {
                info!(
                    "Battery SOC not available from {}, skipping balancing check",
                    self.sources.battery.name()
                );
                return None;
            }
            Err(e) => {
                warn!(
                    "⚠️ Failed to read battery state from {}: {e:#}",
                    self.sources.battery.name()
                );
                return None;
            }
        };

        let capacity = reading
            .capacity_kwh
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(self.battery_config.capacity_kwh);
        if capacity <= 0.0 {
            info!("Battery capacity unknown, skipping balancing check");
            return None;
        }

        let timeline = match self.sources.forecast.read_forecast().await {
            Ok(timeline) if !timeline.is_empty() => timeline,
            Ok(_) => {
                info!(
                    "Forecast from {} is empty, skipping balancing check",
                    self.sources.forecast.name()
                );
                return None;
            }
            Err(e) => {
                warn!(
                    "⚠️ Failed to read forecast from {}: {e:#}",
                    self.sources.forecast.name()
                );
                return None;
            }
        };

        let battery = BatteryModel::from_config(&self.battery_config, capacity);
        Some(CheckInputs {
            soc_percent: reading.soc_percent,
            soc_kwh: battery.soc_kwh(reading.soc_percent),
            battery,
            timeline,
        })
    }

    async fn detect_completion(&self, now: DateTime<Utc>) -> CompletionOutcome {
        let lookback_hours = (i64::from(self.config.cycle_days) * 24)
            .max(i64::from(self.config.holding_time_hours) + 1);
        let start = now - Duration::hours(lookback_hours);

        let stats = match self
            .sources
            .history
            .hourly_soc_statistics(start, now)
            .await
        {
            Ok(stats) => stats,
            Err(e) if e.is_transient() => {
                debug!(
                    "SOC history from {} not ready ({e}), skipping balancing check",
                    self.sources.history.name()
                );
                return CompletionOutcome::Skip;
            }
            Err(e) => {
                warn!("⚠️ Balancing completion detection skipped: {e}");
                return CompletionOutcome::NotFound;
            }
        };

        let Some(run) = detect_completed_balancing(&stats, self.config.holding_duration(), now)
        else {
            return CompletionOutcome::NotFound;
        };

        // A run that began before the recorded balancing was already counted
        let is_new = self
            .state
            .last_balancing_ts
            .is_none_or(|last| run.end > last && run.start >= last);

        if is_new {
            CompletionOutcome::Completed(run.end)
        } else {
            CompletionOutcome::NotFound
        }
    }

    async fn record_completion(&mut self, completed_at: DateTime<Utc>) {
        info!("✅ Battery balancing completed at {completed_at}");
        self.state.last_balancing_ts = Some(completed_at);
        self.state.active_plan = None;
        self.costs = None;
        self.persist().await;
        self.events
            .publish(BalancingEvent::BalancingCompleted { completed_at });
    }

    /// Natural, then forced, then opportunistic
    fn evaluate(&self, inputs: &CheckInputs, now: DateTime<Utc>) -> Option<Candidate> {
        if let Some(candidate) = self.natural_candidate(inputs, now) {
            return Some(candidate);
        }

        let days_since_last = self.state.days_since_last(now);
        let cycle_days = self.config.cycle_days;
        match days_since_last {
            None => {
                return Some(self.forced_candidate(
                    inputs,
                    now,
                    "No balancing on record".to_owned(),
                ));
            }
            Some(days) if days >= f64::from(cycle_days) => {
                return Some(self.forced_candidate(
                    inputs,
                    now,
                    format!("{days:.1} days since last balancing (limit {cycle_days})"),
                ));
            }
            Some(_) => {}
        }

        self.opportunistic_candidate(inputs, now, days_since_last)
    }

    fn natural_candidate(&self, inputs: &CheckInputs, now: DateTime<Utc>) -> Option<Candidate> {
        let (start, _) = detect_natural_window(
            inputs.timeline.future_from(now),
            inputs.battery.capacity_kwh,
            self.config.holding_blocks(),
        )?;

        info!("☀️ Forecast already holds the battery full from {start}, natural balancing");
        let plan = PlanBuilder::new(&inputs.battery, &self.config).build(PlanRequest {
            mode: BalancingMode::Natural,
            reason: format!(
                "Forecast keeps battery at 100% for {}h",
                self.config.holding_time_hours
            ),
            holding_start: start,
            now,
            current_soc_kwh: inputs.soc_kwh,
        });

        Some(Candidate {
            plan,
            costs: BalancingCosts::new(0.0, 0.0),
        })
    }

    fn forced_candidate(
        &self,
        inputs: &CheckInputs,
        now: DateTime<Utc>,
        reason: String,
    ) -> Candidate {
        let cost_model = CostModel::new(
            &inputs.timeline,
            &inputs.battery,
            self.config.holding_duration(),
            now,
        );
        let immediate_cost = cost_model.immediate_cost(inputs.soc_kwh);
        let builder = PlanBuilder::new(&inputs.battery, &self.config);

        if immediate_cost < IMMEDIATE_COST_SENTINEL {
            warn!("⚠️ Forced balancing: {reason} (charging cost {immediate_cost:.2} CZK)");
        } else {
            warn!("⚠️ Forced balancing: {reason} (no current price)");
        }

        let plan = builder.build(PlanRequest {
            mode: BalancingMode::Forced,
            reason,
            holding_start: builder.asap_holding_start(now, inputs.soc_kwh),
            now,
            current_soc_kwh: inputs.soc_kwh,
        });

        Candidate {
            plan,
            costs: BalancingCosts::new(immediate_cost, immediate_cost),
        }
    }

    fn opportunistic_candidate(
        &self,
        inputs: &CheckInputs,
        now: DateTime<Utc>,
        days_since_last: Option<f64>,
    ) -> Option<Candidate> {
        if inputs.soc_percent < self.config.soc_threshold_percent {
            debug!(
                "SOC {:.1}% below opportunistic threshold {:.1}%",
                inputs.soc_percent, self.config.soc_threshold_percent
            );
            return None;
        }

        if let Some(since) = self.state.last_plan_ts.max(self.state.last_balancing_ts)
            && now - since < self.config.cooldown()
        {
            debug!("Opportunistic balancing cooling down since {since}");
            return None;
        }

        let cost_model = CostModel::new(
            &inputs.timeline,
            &inputs.battery,
            self.config.holding_duration(),
            now,
        );
        let immediate_cost = cost_model.immediate_cost(inputs.soc_kwh);
        let search = WindowSearch::new(&cost_model, &self.config, days_since_last);
        let (best_start, best_cost) = search.select_best_window(
            &inputs.timeline.price_points(),
            immediate_cost,
            self.config.holding_time_hours,
            inputs.soc_kwh,
        );

        let builder = PlanBuilder::new(&inputs.battery, &self.config);
        let (holding_start, reason, costs) = match best_start {
            Some(start) => (
                start,
                format!(
                    "Cheap window at {start}, saves {:.2} CZK vs charging now",
                    immediate_cost - best_cost
                ),
                BalancingCosts::new(immediate_cost, best_cost),
            ),
            None if immediate_cost >= IMMEDIATE_COST_SENTINEL => {
                info!("No current price and no cheap window, opportunistic balancing skipped");
                return None;
            }
            None => (
                builder.asap_holding_start(now, inputs.soc_kwh),
                "No cheaper window ahead, charging now".to_owned(),
                BalancingCosts::new(immediate_cost, immediate_cost),
            ),
        };

        info!(
            "💰 Opportunistic balancing: immediate {:.2} CZK, selected {:.2} CZK",
            costs.immediate_cost, costs.selected_cost
        );

        let plan = builder.build(PlanRequest {
            mode: BalancingMode::Opportunistic,
            reason,
            holding_start,
            now,
            current_soc_kwh: inputs.soc_kwh,
        });

        Some(Candidate { plan, costs })
    }

    async fn activate(&mut self, candidate: Candidate, now: DateTime<Utc>) -> BalancingPlan {
        let Candidate { plan, costs } = candidate;

        info!(
            "🔋 {} balancing plan created: holding {} - {} ({} intervals) | {}",
            plan.mode,
            plan.holding_start,
            plan.holding_end,
            plan.intervals.len(),
            plan.reason
        );

        self.state.active_plan = Some(plan.clone());
        self.state.last_plan_ts = Some(now);
        self.state.last_plan_mode = Some(plan.mode);
        self.costs = Some(costs);

        self.persist().await;
        self.events.publish(BalancingEvent::PlanCreated(plan.clone()));

        plan
    }

    /// Save the state off the async executor; failures are logged and the decision stands
    async fn persist(&self) {
        let store = Arc::clone(&self.store);
        let state = self.state.clone();

        match tokio::task::spawn_blocking(move || store.save(&state)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(
                "❌ Failed to persist balancing state via {}: {e:#}",
                self.store.name()
            ),
            Err(e) => error!("❌ Balancing state persistence task failed: {e}"),
        }
    }
}
