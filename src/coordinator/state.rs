//! Shared coordinator state
//!
//! Everything the coordination API and the movement simulator operate on,
//! behind one `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::destination::DestinationCoordinator;
use crate::directory::GroupDirectory;
use crate::domain::{GroupEvent, GroupId, HubMessage, MemberId, Position, PositionView};
use crate::error::{ConvoyError, Result};
use crate::hub::BroadcastHub;
use crate::proximity::ProximityEngine;
use crate::store::GeoStore;

use super::locks::{GroupLedger, GroupLocks};

pub struct CoordinatorState {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub store: GeoStore,
    pub proximity: ProximityEngine,
    pub destinations: DestinationCoordinator,
    pub hub: BroadcastHub,
    pub locks: GroupLocks,
    pub directory: Arc<dyn GroupDirectory>,
}

impl CoordinatorState {
    pub fn new(config: AppConfig, directory: Arc<dyn GroupDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: GeoStore::new(clock.clone()),
            proximity: ProximityEngine::new(config.geofence.default_radius_km),
            destinations: DestinationCoordinator::new(clock.clone()),
            hub: BroadcastHub::new(config.hub.subscriber_buffer),
            locks: GroupLocks::new(),
            directory,
            clock,
            config,
        }
    }

    /// Fail with `NotFound` unless the directory knows the group
    pub async fn ensure_group(&self, group_id: &GroupId) -> Result<()> {
        match self.directory.group(group_id).await {
            Some(_) => Ok(()),
            None => Err(ConvoyError::not_found(format!("group {group_id}"))),
        }
    }

    /// Wrap events in envelopes. Must be called with the group lock held so
    /// sequence numbers follow state-change order.
    pub fn stamp(
        &self,
        ledger: &mut GroupLedger,
        group_id: &GroupId,
        events: Vec<GroupEvent>,
    ) -> Vec<HubMessage> {
        let emitted_at = self.clock.now();
        events
            .into_iter()
            .map(|event| HubMessage {
                group_id: group_id.clone(),
                seq: ledger.next_seq(),
                emitted_at,
                event,
            })
            .collect()
    }

    /// Resolve display names and fan out. Call after releasing the group lock.
    pub async fn publish_all(&self, mut messages: Vec<HubMessage>) -> usize {
        if messages.is_empty() {
            return 0;
        }

        let names = self
            .display_names(messages.iter().flat_map(|m| m.event.member_ids()).cloned())
            .await;

        let mut delivered = 0;
        for mut message in messages.drain(..) {
            message.event.apply_names(&names);
            delivered += self.hub.publish(message);
        }
        debug!(delivered, "messages fanned out");
        delivered
    }

    pub async fn view(&self, position: Position) -> PositionView {
        let name = self
            .directory
            .member(&position.member_id)
            .await
            .map(|m| m.display_name);
        PositionView::new(position, name)
    }

    pub async fn views(&self, positions: Vec<Position>) -> Vec<PositionView> {
        let names = self
            .display_names(positions.iter().map(|p| p.member_id.clone()))
            .await;
        positions
            .into_iter()
            .map(|p| {
                let name = names.get(&p.member_id).cloned();
                PositionView::new(p, name)
            })
            .collect()
    }

    async fn display_names(
        &self,
        member_ids: impl Iterator<Item = MemberId>,
    ) -> HashMap<MemberId, String> {
        let mut names = HashMap::new();
        for member_id in member_ids {
            if names.contains_key(&member_id) {
                continue;
            }
            if let Some(member) = self.directory.member(&member_id).await {
                names.insert(member_id, member.display_name);
            }
        }
        names
    }
}
