//! Geospatial store
//!
//! One live `Position` per (member, group). Groups are `DashMap` shards so
//! writers in different groups never contend; within a group, members are kept
//! in a `BTreeMap` which makes iteration order (and therefore nearest-neighbor
//! tie breaks) deterministic: group id ascending, then member id ascending.
//!
//! The store does not serialize compound operations. Callers that read, decide
//! and write (the coordinator and the simulator) hold the per-group lock.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::domain::{GroupId, MemberId, Position};
use crate::error::{ConvoyError, Result};
use crate::geo::{validate_coordinates, validate_radius, validate_speed};

pub struct GeoStore {
    groups: DashMap<GroupId, BTreeMap<MemberId, Position>>,
    clock: Arc<dyn Clock>,
}

impl GeoStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            groups: DashMap::new(),
            clock,
        }
    }

    /// Validate, stamp and store a position, replacing any previous entry for the key
    pub fn upsert_position(
        &self,
        member_id: &MemberId,
        group_id: &GroupId,
        lat: f64,
        lng: f64,
        speed_kmh: f64,
    ) -> Result<Position> {
        validate_coordinates(lat, lng)?;
        validate_speed(speed_kmh)?;

        let position = Position {
            member_id: member_id.clone(),
            group_id: group_id.clone(),
            lat,
            lng,
            speed_kmh,
            updated_at: self.clock.now(),
        };

        self.groups
            .entry(group_id.clone())
            .or_default()
            .insert(member_id.clone(), position.clone());

        debug!(member = %member_id, group = %group_id, lat, lng, speed_kmh, "position stored");
        Ok(position)
    }

    /// Overwrite a position that must already exist.
    ///
    /// Used by the simulator, which only moves members it has just read; a
    /// missing entry means the group was torn down underneath it.
    pub fn replace_existing(
        &self,
        member_id: &MemberId,
        group_id: &GroupId,
        lat: f64,
        lng: f64,
        speed_kmh: f64,
    ) -> Result<Position> {
        validate_coordinates(lat, lng)?;
        validate_speed(speed_kmh)?;

        let mut group = self.groups.get_mut(group_id).ok_or_else(|| {
            ConvoyError::Internal(format!("group {group_id} vanished from the store"))
        })?;
        let entry = group.get_mut(member_id).ok_or_else(|| {
            ConvoyError::Internal(format!(
                "position for {member_id} in {group_id} vanished from the store"
            ))
        })?;

        entry.lat = lat;
        entry.lng = lng;
        entry.speed_kmh = speed_kmh;
        entry.updated_at = self.clock.now();
        Ok(entry.clone())
    }

    pub fn get_position(&self, member_id: &MemberId, group_id: &GroupId) -> Option<Position> {
        self.groups
            .get(group_id)
            .and_then(|group| group.get(member_id).cloned())
    }

    /// All live positions of a group, member id ascending
    pub fn get_positions(&self, group_id: &GroupId) -> Vec<Position> {
        self.groups
            .get(group_id)
            .map(|group| group.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Positions in a group within `radius_km` of the origin (inclusive)
    pub fn find_within_radius(
        &self,
        group_id: &GroupId,
        origin_lat: f64,
        origin_lng: f64,
        radius_km: f64,
        exclude: Option<&MemberId>,
    ) -> Result<Vec<Position>> {
        validate_coordinates(origin_lat, origin_lng)?;
        validate_radius(radius_km)?;

        let Some(group) = self.groups.get(group_id) else {
            return Ok(Vec::new());
        };

        Ok(group
            .values()
            .filter(|p| exclude != Some(&p.member_id))
            .filter(|p| p.distance_to(origin_lat, origin_lng) <= radius_km)
            .cloned()
            .collect())
    }

    /// Cross-group radius query, closest first
    pub fn find_within_radius_all(
        &self,
        origin_lat: f64,
        origin_lng: f64,
        radius_km: f64,
    ) -> Result<Vec<(Position, f64)>> {
        validate_coordinates(origin_lat, origin_lng)?;
        validate_radius(radius_km)?;

        let mut hits = Vec::new();
        for group_id in self.group_ids() {
            let Some(group) = self.groups.get(&group_id) else {
                continue;
            };
            for position in group.values() {
                let distance = position.distance_to(origin_lat, origin_lng);
                if distance <= radius_km {
                    hits.push((position.clone(), distance));
                }
            }
        }

        // Stable sort keeps iteration order among equal distances
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(hits)
    }

    /// Closest position within `max_distance_km`, scoped to a group or global.
    ///
    /// Ties go to the first position encountered in iteration order
    /// (group id ascending, then member id ascending).
    pub fn find_nearest(
        &self,
        lat: f64,
        lng: f64,
        max_distance_km: f64,
        group_id: Option<&GroupId>,
    ) -> Result<Option<(Position, f64)>> {
        validate_coordinates(lat, lng)?;
        validate_radius(max_distance_km)?;

        let group_ids = match group_id {
            Some(id) => vec![id.clone()],
            None => self.group_ids(),
        };

        let mut best: Option<(Position, f64)> = None;
        for id in group_ids {
            let Some(group) = self.groups.get(&id) else {
                continue;
            };
            for position in group.values() {
                let distance = position.distance_to(lat, lng);
                if distance > max_distance_km {
                    continue;
                }
                let closer = best.as_ref().map_or(true, |(_, d)| distance < *d);
                if closer {
                    best = Some((position.clone(), distance));
                }
            }
        }

        Ok(best)
    }

    /// Group ids with at least one stored entry, ascending
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.groups.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop every position of a group (external teardown)
    pub fn remove_group(&self, group_id: &GroupId) -> usize {
        self.groups
            .remove(group_id)
            .map(|(_, members)| members.len())
            .unwrap_or(0)
    }

    pub fn position_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }
}
