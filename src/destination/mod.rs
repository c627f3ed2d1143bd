//! Destination coordinator: the per-group propose → confirm protocol
//!
//! A proposal always replaces whatever the group had (pending or confirmed)
//! and resets it to unconfirmed. Confirming an already confirmed destination
//! is a successful no-op.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::{Destination, DestinationState, GroupId};
use crate::error::{ConvoyError, Result};
use crate::geo::validate_coordinates;

pub struct DestinationCoordinator {
    destinations: DashMap<GroupId, Destination>,
    clock: Arc<dyn Clock>,
}

impl DestinationCoordinator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            destinations: DashMap::new(),
            clock,
        }
    }

    pub fn propose(&self, group_id: &GroupId, lat: f64, lng: f64) -> Result<Destination> {
        validate_coordinates(lat, lng)?;

        let destination = Destination {
            group_id: group_id.clone(),
            lat,
            lng,
            confirmed: false,
            proposed_at: self.clock.now(),
            confirmed_at: None,
        };

        if let Some(previous) = self
            .destinations
            .insert(group_id.clone(), destination.clone())
        {
            debug!(
                group = %group_id,
                previous_state = %previous.state(),
                "destination proposal replaces existing destination"
            );
        }

        info!(group = %group_id, lat, lng, "destination proposed");
        Ok(destination)
    }

    /// Confirm the pending proposal. A group with nothing proposed fails with
    /// `InvalidState`; unknown groups are rejected earlier with `NotFound`.
    pub fn confirm(&self, group_id: &GroupId) -> Result<Destination> {
        let mut entry = self.destinations.get_mut(group_id).ok_or_else(|| {
            ConvoyError::InvalidState(format!("no pending destination to confirm for {group_id}"))
        })?;

        if entry.confirmed {
            debug!(group = %group_id, "destination already confirmed");
            return Ok(entry.clone());
        }

        entry.confirmed = true;
        entry.confirmed_at = Some(self.clock.now());
        info!(group = %group_id, lat = entry.lat, lng = entry.lng, "destination confirmed");
        Ok(entry.clone())
    }

    pub fn current(&self, group_id: &GroupId) -> Option<Destination> {
        self.destinations.get(group_id).map(|d| d.clone())
    }

    pub fn state(&self, group_id: &GroupId) -> DestinationState {
        self.destinations
            .get(group_id)
            .map(|d| d.state())
            .unwrap_or(DestinationState::None)
    }

    /// Groups whose destination is confirmed, ascending
    pub fn confirmed_groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self
            .destinations
            .iter()
            .filter(|d| d.confirmed)
            .map(|d| d.key().clone())
            .collect();
        groups.sort();
        groups
    }

    pub fn clear(&self, group_id: &GroupId) -> Option<Destination> {
        self.destinations.remove(group_id).map(|(_, d)| d)
    }
}
