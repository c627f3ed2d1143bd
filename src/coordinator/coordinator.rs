//! LocationCoordinator: the public coordination API
//!
//! Clone-friendly handle over the shared state. Each state-changing operation:
//!   - checks the group exists in the directory
//!   - takes the group lock, mutates, and stamps the resulting events
//!   - releases the lock, then resolves names and publishes through the hub

use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::directory::GroupDirectory;
use crate::domain::{
    Destination, DestinationState, GroupEvent, GroupId, MemberId, PositionView,
};
use crate::error::{ConvoyError, Result};
use crate::hub::{BroadcastHub, ConnectionId};

use super::state::CoordinatorState;

#[derive(Clone)]
pub struct LocationCoordinator {
    state: Arc<CoordinatorState>,
}

impl LocationCoordinator {
    pub fn new(config: AppConfig, directory: Arc<dyn GroupDirectory>) -> Self {
        Self::with_clock(config, directory, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        directory: Arc<dyn GroupDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(CoordinatorState::new(config, directory, clock)),
        }
    }

    pub fn state(&self) -> Arc<CoordinatorState> {
        self.state.clone()
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.state.hub
    }

    /// Record a member's position and evaluate its pairs against the geofence.
    ///
    /// A missing speed is stored as 0, which lets the simulator synthesize one.
    pub async fn update_location(
        &self,
        member_id: &MemberId,
        group_id: &GroupId,
        lat: f64,
        lng: f64,
        speed_kmh: Option<f64>,
    ) -> Result<PositionView> {
        self.state.ensure_group(group_id).await?;

        let (position, messages) = {
            let mut ledger = self.state.locks.lock(group_id).await;
            let position = self.state.store.upsert_position(
                member_id,
                group_id,
                lat,
                lng,
                speed_kmh.unwrap_or(0.0),
            )?;

            let positions = self.state.store.get_positions(group_id);
            let mut events = vec![GroupEvent::LocationUpdate((&position).into())];
            events.extend(
                self.state
                    .proximity
                    .evaluate_member(group_id, member_id, &positions)
                    .iter()
                    .map(|e| e.to_group_event()),
            );
            let messages = self.state.stamp(&mut ledger, group_id, events);
            (position, messages)
        };

        self.state.publish_all(messages).await;
        Ok(self.state.view(position).await)
    }

    /// Propose a destination; replaces any pending or confirmed one
    pub async fn propose_destination(
        &self,
        group_id: &GroupId,
        lat: f64,
        lng: f64,
    ) -> Result<Destination> {
        self.state.ensure_group(group_id).await?;

        let (destination, messages) = {
            let mut ledger = self.state.locks.lock(group_id).await;
            let destination = self.state.destinations.propose(group_id, lat, lng)?;
            let event = GroupEvent::DestinationProposal((&destination).into());
            let messages = self.state.stamp(&mut ledger, group_id, vec![event]);
            (destination, messages)
        };

        self.state.publish_all(messages).await;
        Ok(destination)
    }

    /// Confirm the pending proposal. Re-confirming succeeds without a broadcast.
    pub async fn confirm_destination(&self, group_id: &GroupId) -> Result<Destination> {
        self.state.ensure_group(group_id).await?;

        let (destination, messages) = {
            let mut ledger = self.state.locks.lock(group_id).await;
            let was_confirmed =
                self.state.destinations.state(group_id) == DestinationState::Confirmed;
            let destination = self.state.destinations.confirm(group_id)?;

            let messages = if was_confirmed {
                Vec::new()
            } else {
                let event = GroupEvent::DestinationConfirmed((&destination).into());
                self.state.stamp(&mut ledger, group_id, vec![event])
            };
            (destination, messages)
        };

        self.state.publish_all(messages).await;
        Ok(destination)
    }

    /// Change the group's geofence radius and re-evaluate every pair under it
    pub async fn set_geofence_radius(&self, group_id: &GroupId, radius_km: f64) -> Result<()> {
        self.state.ensure_group(group_id).await?;

        let messages = {
            let mut ledger = self.state.locks.lock(group_id).await;
            self.state.proximity.set_radius(group_id, radius_km)?;

            let positions = self.state.store.get_positions(group_id);
            let events = self
                .state
                .proximity
                .evaluate(group_id, &positions)
                .iter()
                .map(|e| e.to_group_event())
                .collect();
            self.state.stamp(&mut ledger, group_id, events)
        };

        info!(group = %group_id, radius_km, "geofence radius updated");
        self.state.publish_all(messages).await;
        Ok(())
    }

    /// Positions across all groups within `max_distance_km`, nearest first
    pub async fn query_nearby(
        &self,
        lat: f64,
        lng: f64,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<PositionView>> {
        let radius = max_distance_km.unwrap_or(self.state.config.queries.nearby_default_km);
        let hits = self.state.store.find_within_radius_all(lat, lng, radius)?;

        let distances: Vec<f64> = hits.iter().map(|(_, d)| *d).collect();
        let views = self
            .state
            .views(hits.into_iter().map(|(p, _)| p).collect())
            .await;

        debug!(lat, lng, radius, found = views.len(), "nearby query");
        Ok(views
            .into_iter()
            .zip(distances)
            .map(|(view, d)| view.with_distance(d))
            .collect())
    }

    /// Closest member of the group within the configured maximum distance
    pub async fn query_nearest(
        &self,
        group_id: &GroupId,
        lat: f64,
        lng: f64,
    ) -> Result<PositionView> {
        self.state.ensure_group(group_id).await?;

        let max_km = self.state.config.queries.nearest_max_km;
        let (position, distance) = self
            .state
            .store
            .find_nearest(lat, lng, max_km, Some(group_id))?
            .ok_or_else(|| {
                ConvoyError::not_found(format!("no member of {group_id} within {max_km} km"))
            })?;

        Ok(self.state.view(position).await.with_distance(distance))
    }

    pub async fn list_group_locations(&self, group_id: &GroupId) -> Result<Vec<PositionView>> {
        self.state.ensure_group(group_id).await?;
        let positions = self.state.store.get_positions(group_id);
        Ok(self.state.views(positions).await)
    }

    pub async fn current_destination(&self, group_id: &GroupId) -> Result<Option<Destination>> {
        self.state.ensure_group(group_id).await?;
        Ok(self.state.destinations.current(group_id))
    }

    /// Drop all live state kept for a group (positions, destination, alerts,
    /// radius) along with its lock once nobody else is using it
    pub async fn teardown_group(&self, group_id: &GroupId) -> Result<usize> {
        let removed = {
            let _ledger = self.state.locks.lock(group_id).await;
            let removed = self.state.store.remove_group(group_id);
            self.state.destinations.clear(group_id);
            self.state.proximity.clear_group(group_id);
            removed
        };
        let lock_released = self.state.locks.remove_idle(group_id);
        info!(group = %group_id, positions = removed, lock_released, "group torn down");
        Ok(removed)
    }

    /// Join a hub connection to the group's room
    pub async fn subscribe(&self, connection: ConnectionId, group_id: &GroupId) -> Result<()> {
        self.state.ensure_group(group_id).await?;
        if self.state.hub.subscribe(connection, group_id) {
            Ok(())
        } else {
            Err(ConvoyError::not_found(format!("connection {connection}")))
        }
    }
}
