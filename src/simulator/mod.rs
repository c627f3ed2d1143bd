//! Movement simulator
//!
//! Walks members of groups with a confirmed destination towards it, one step
//! per tick. Each group is ticked in its own task under the group lock, so a
//! failing or panicking group never affects the others or the scheduler.

pub mod movement;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::coordination::{GracefulShutdown, ShutdownSignal, ShutdownToken};
use crate::coordinator::CoordinatorState;
use crate::domain::{ArrivalPayload, Destination, GroupEvent, GroupId, Position};
use crate::error::Result;
use crate::geo::{validate_coordinates, validate_speed};

pub use movement::{advance_towards, SpeedSampler};

/// Summary of one scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub groups_visited: usize,
    pub members_moved: usize,
    pub arrivals: usize,
    pub member_failures: usize,
    pub group_failures: usize,
}

impl TickReport {
    pub fn has_activity(&self) -> bool {
        self.members_moved > 0
            || self.arrivals > 0
            || self.member_failures > 0
            || self.group_failures > 0
    }

    fn absorb(&mut self, other: TickReport) {
        self.groups_visited += other.groups_visited;
        self.members_moved += other.members_moved;
        self.arrivals += other.arrivals;
        self.member_failures += other.member_failures;
        self.group_failures += other.group_failures;
    }
}

#[derive(Clone)]
pub struct MovementSimulator {
    state: Arc<CoordinatorState>,
    speeds: Arc<SpeedSampler>,
}

impl MovementSimulator {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        let sim = &state.config.simulation;
        let speeds = SpeedSampler::new(
            sim.synthetic_speed_min_kmh,
            sim.synthetic_speed_max_kmh,
            sim.seed,
        );
        Self {
            state,
            speeds: Arc::new(speeds),
        }
    }

    /// Advance every group with a confirmed destination by one step
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let mut tasks = JoinSet::new();

        for group_id in self.state.destinations.confirmed_groups() {
            let simulator = self.clone();
            tasks.spawn(async move { simulator.tick_group(&group_id).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.absorb(outcome),
                Err(e) => {
                    error!(error = %e, "group tick task failed");
                    report.group_failures += 1;
                }
            }
        }

        report
    }

    async fn tick_group(&self, group_id: &GroupId) -> TickReport {
        let mut outcome = TickReport::default();

        let messages = {
            let mut ledger = self.state.locks.lock(group_id).await;

            // A proposal may have landed since the group was listed
            let Some(destination) = self
                .state
                .destinations
                .current(group_id)
                .filter(|d| d.confirmed)
            else {
                return outcome;
            };
            outcome.groups_visited = 1;

            let members = self.state.store.get_positions(group_id);
            let mut events = self.step_members(&members, &destination, &mut outcome);

            let positions = self.state.store.get_positions(group_id);
            events.extend(
                self.state
                    .proximity
                    .evaluate(group_id, &positions)
                    .iter()
                    .map(|e| e.to_group_event()),
            );
            self.state.stamp(&mut ledger, group_id, events)
        };

        self.state.publish_all(messages).await;
        outcome
    }

    /// Step each member in turn. A member that fails is logged and skipped.
    fn step_members(
        &self,
        positions: &[Position],
        destination: &Destination,
        outcome: &mut TickReport,
    ) -> Vec<GroupEvent> {
        let mut events = Vec::new();
        for position in positions {
            match self.step_member(position, destination, outcome) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        group = %position.group_id,
                        member = %position.member_id,
                        error = %e,
                        "skipping member in simulation step"
                    );
                    outcome.member_failures += 1;
                }
            }
        }
        events
    }

    fn step_member(
        &self,
        position: &Position,
        destination: &Destination,
        outcome: &mut TickReport,
    ) -> Result<Option<GroupEvent>> {
        validate_coordinates(position.lat, position.lng)?;
        validate_speed(position.speed_kmh)?;

        let at_destination = position.lat == destination.lat && position.lng == destination.lng;
        if at_destination && position.speed_kmh == 0.0 {
            return Ok(None);
        }

        let sim = &self.state.config.simulation;
        let store = &self.state.store;
        let remaining_km = position.distance_to(destination.lat, destination.lng);

        if remaining_km < sim.arrival_threshold_km {
            let announce = position.speed_kmh != 0.0;
            let snapped = store.replace_existing(
                &position.member_id,
                &position.group_id,
                destination.lat,
                destination.lng,
                0.0,
            )?;
            if !announce {
                debug!(member = %snapped.member_id, "stationary member snapped to destination");
                return Ok(None);
            }

            outcome.arrivals += 1;
            info!(group = %snapped.group_id, member = %snapped.member_id, "member arrived");
            return Ok(Some(GroupEvent::UserArrived(ArrivalPayload {
                member_id: snapped.member_id,
                display_name: None,
                lat: snapped.lat,
                lng: snapped.lng,
                message: String::new(),
            })));
        }

        let speed_kmh = if position.speed_kmh > 0.0 {
            position.speed_kmh
        } else {
            self.speeds.sample()
        };
        let (lat, lng) = advance_towards(
            (position.lat, position.lng),
            (destination.lat, destination.lng),
            remaining_km,
            speed_kmh,
            sim.tick_seconds(),
        );
        let moved =
            store.replace_existing(&position.member_id, &position.group_id, lat, lng, speed_kmh)?;

        outcome.members_moved += 1;
        Ok(Some(GroupEvent::LocationUpdate((&moved).into())))
    }

    /// Tick on the configured period until shutdown. Returns the number of ticks run.
    ///
    /// A tick that has started always runs to completion before the loop exits.
    pub async fn run(self, mut token: ShutdownToken) -> u64 {
        let tick_ms = self.state.config.simulation.tick_ms.max(1);
        let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if token.is_shutdown_requested() {
            return 0;
        }

        info!(tick_ms, "movement simulator started");
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    ticks += 1;
                    if report.has_activity() {
                        debug!(
                            tick = ticks,
                            groups = report.groups_visited,
                            moved = report.members_moved,
                            arrivals = report.arrivals,
                            member_failures = report.member_failures,
                            group_failures = report.group_failures,
                            "simulation tick"
                        );
                    }
                }
                signal = token.wait_for_shutdown() => {
                    info!(%signal, ticks, "movement simulator stopping");
                    break;
                }
            }
        }
        ticks
    }

    pub fn spawn(self, shutdown: Arc<GracefulShutdown>) -> SimulatorHandle {
        let token = shutdown.token();
        SimulatorHandle {
            shutdown,
            task: tokio::spawn(self.run(token)),
        }
    }
}

pub struct SimulatorHandle {
    shutdown: Arc<GracefulShutdown>,
    task: JoinHandle<u64>,
}

impl SimulatorHandle {
    /// Request shutdown (if nobody has yet) and wait for the loop to exit
    pub async fn shutdown(self) -> u64 {
        if !self.shutdown.is_shutdown_requested() {
            self.shutdown.request_shutdown(ShutdownSignal::Graceful);
        }
        match self.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                error!(error = %e, "movement simulator task failed");
                0
            }
        }
    }
}
