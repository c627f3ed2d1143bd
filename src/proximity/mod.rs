//! Geofence proximity engine
//!
//! Keeps, per group, the geofence radius and the set of member pairs that are
//! currently inside it. Evaluation is edge-triggered: a pair produces one
//! `Entered` when it first comes within the radius and one `Exited` when it
//! separates again, nothing in between.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::{GeofencePayload, GroupEvent, GroupId, MemberId, MemberPair, Position};
use crate::error::Result;
use crate::geo::validate_radius;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProximityKind {
    Entered,
    Exited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityEvent {
    pub kind: ProximityKind,
    pub group_id: GroupId,
    /// Reference member (the mover when evaluating a single member)
    pub member: Position,
    /// The other member of the pair
    pub nearby: Position,
    pub distance_km: f64,
    pub radius_km: f64,
}

impl ProximityEvent {
    /// Broadcast form; names and message are filled in before publishing
    pub fn to_group_event(&self) -> GroupEvent {
        let payload = GeofencePayload {
            member_id: self.member.member_id.clone(),
            member_name: None,
            nearby_member_id: self.nearby.member_id.clone(),
            nearby_member_name: None,
            lat: self.nearby.lat,
            lng: self.nearby.lng,
            distance_km: self.distance_km,
            radius_km: self.radius_km,
            message: String::new(),
        };
        match self.kind {
            ProximityKind::Entered => GroupEvent::GeofenceAlert(payload),
            ProximityKind::Exited => GroupEvent::GeofenceCleared(payload),
        }
    }
}

pub struct ProximityEngine {
    default_radius_km: f64,
    radii: DashMap<GroupId, f64>,
    alerted: DashMap<GroupId, HashSet<MemberPair>>,
}

impl ProximityEngine {
    pub fn new(default_radius_km: f64) -> Self {
        Self {
            default_radius_km,
            radii: DashMap::new(),
            alerted: DashMap::new(),
        }
    }

    pub fn set_radius(&self, group_id: &GroupId, radius_km: f64) -> Result<()> {
        validate_radius(radius_km)?;
        self.radii.insert(group_id.clone(), radius_km);
        debug!(group = %group_id, radius_km, "geofence radius set");
        Ok(())
    }

    pub fn radius(&self, group_id: &GroupId) -> f64 {
        self.radii
            .get(group_id)
            .map(|r| *r)
            .unwrap_or(self.default_radius_km)
    }

    /// Evaluate every pair in the group
    pub fn evaluate(&self, group_id: &GroupId, positions: &[Position]) -> Vec<ProximityEvent> {
        self.evaluate_pairs(group_id, positions, None)
    }

    /// Evaluate only the pairs that involve `mover`
    pub fn evaluate_member(
        &self,
        group_id: &GroupId,
        mover: &MemberId,
        positions: &[Position],
    ) -> Vec<ProximityEvent> {
        self.evaluate_pairs(group_id, positions, Some(mover))
    }

    fn evaluate_pairs(
        &self,
        group_id: &GroupId,
        positions: &[Position],
        mover: Option<&MemberId>,
    ) -> Vec<ProximityEvent> {
        let radius_km = self.radius(group_id);
        let by_member: HashMap<&MemberId, &Position> =
            positions.iter().map(|p| (&p.member_id, p)).collect();

        let mut events = Vec::new();
        let mut alerted = self.alerted.entry(group_id.clone()).or_default();

        // Pairs whose member disappeared cannot exit meaningfully; drop them quietly
        alerted.retain(|pair| {
            by_member.contains_key(&pair.first) && by_member.contains_key(&pair.second)
        });

        for (i, a) in positions.iter().enumerate() {
            for b in positions.iter().skip(i + 1) {
                if a.member_id == b.member_id {
                    continue;
                }
                let (member, nearby) = match mover {
                    Some(m) if &a.member_id == m => (a, b),
                    Some(m) if &b.member_id == m => (b, a),
                    Some(_) => continue,
                    None => (a, b),
                };

                let pair = MemberPair::new(a.member_id.clone(), b.member_id.clone());
                let distance_km = a.distance_to_position(b);
                let inside = distance_km <= radius_km;
                let was_alerted = alerted.contains(&pair);

                let kind = match (inside, was_alerted) {
                    (true, false) => {
                        alerted.insert(pair);
                        ProximityKind::Entered
                    }
                    (false, true) => {
                        alerted.remove(&pair);
                        ProximityKind::Exited
                    }
                    _ => continue,
                };

                debug!(
                    group = %group_id,
                    member = %member.member_id,
                    nearby = %nearby.member_id,
                    distance_km,
                    radius_km,
                    ?kind,
                    "proximity transition"
                );
                events.push(ProximityEvent {
                    kind,
                    group_id: group_id.clone(),
                    member: member.clone(),
                    nearby: nearby.clone(),
                    distance_km,
                    radius_km,
                });
            }
        }

        events
    }

    pub fn alerted_pairs(&self, group_id: &GroupId) -> Vec<MemberPair> {
        let mut pairs: Vec<MemberPair> = self
            .alerted
            .get(group_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        pairs.sort();
        pairs
    }

    pub fn clear_group(&self, group_id: &GroupId) {
        self.alerted.remove(group_id);
        self.radii.remove(group_id);
    }
}
