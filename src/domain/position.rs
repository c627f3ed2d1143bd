use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{GroupId, MemberId};

/// Latest known location of one member inside one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub member_id: MemberId,
    pub group_id: GroupId,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn distance_to(&self, lat: f64, lng: f64) -> f64 {
        crate::geo::haversine_km(self.lat, self.lng, lat, lng)
    }

    pub fn distance_to_position(&self, other: &Position) -> f64 {
        self.distance_to(other.lat, other.lng)
    }
}

/// Position enriched for API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub member_id: MemberId,
    pub group_id: GroupId,
    pub display_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub updated_at: DateTime<Utc>,
    /// Distance from the query origin, set only by distance-based queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl PositionView {
    pub fn new(position: Position, display_name: Option<String>) -> Self {
        Self {
            member_id: position.member_id,
            group_id: position.group_id,
            display_name,
            lat: position.lat,
            lng: position.lng,
            speed_kmh: position.speed_kmh,
            updated_at: position.updated_at,
            distance_km: None,
        }
    }

    pub fn with_distance(mut self, distance_km: f64) -> Self {
        self.distance_km = Some(distance_km);
        self
    }
}
