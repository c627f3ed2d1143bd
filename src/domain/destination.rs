use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::GroupId;

/// Where a group's destination stands in the propose/confirm protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationState {
    None,
    Proposed,
    Confirmed,
}

impl std::fmt::Display for DestinationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationState::None => write!(f, "none"),
            DestinationState::Proposed => write!(f, "proposed"),
            DestinationState::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Shared destination of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub group_id: GroupId,
    pub lat: f64,
    pub lng: f64,
    pub confirmed: bool,
    pub proposed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Destination {
    pub fn state(&self) -> DestinationState {
        if self.confirmed {
            DestinationState::Confirmed
        } else {
            DestinationState::Proposed
        }
    }
}
