//! Broadcast events pushed to group subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::destination::Destination;
use super::ids::{GroupId, MemberId};
use super::position::Position;

/// Wire names of the broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    LocationUpdate,
    GeofenceAlert,
    GeofenceCleared,
    DestinationProposal,
    DestinationConfirmed,
    UserArrived,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LocationUpdate => "locationUpdate",
            EventType::GeofenceAlert => "geofenceAlert",
            EventType::GeofenceCleared => "geofenceCleared",
            EventType::DestinationProposal => "destinationProposal",
            EventType::DestinationConfirmed => "destinationConfirmed",
            EventType::UserArrived => "userArrived",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub member_id: MemberId,
    pub display_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Position> for LocationPayload {
    fn from(p: &Position) -> Self {
        Self {
            member_id: p.member_id.clone(),
            display_name: None,
            lat: p.lat,
            lng: p.lng,
            speed_kmh: p.speed_kmh,
            updated_at: p.updated_at,
        }
    }
}

/// Pair transition; `lat`/`lng` locate the nearby member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofencePayload {
    pub member_id: MemberId,
    pub member_name: Option<String>,
    pub nearby_member_id: MemberId,
    pub nearby_member_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
    pub radius_km: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationPayload {
    pub lat: f64,
    pub lng: f64,
    pub proposed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<&Destination> for DestinationPayload {
    fn from(d: &Destination) -> Self {
        Self {
            lat: d.lat,
            lng: d.lng,
            proposed_at: d.proposed_at,
            confirmed_at: d.confirmed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalPayload {
    pub member_id: MemberId,
    pub display_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum GroupEvent {
    LocationUpdate(LocationPayload),
    GeofenceAlert(GeofencePayload),
    GeofenceCleared(GeofencePayload),
    DestinationProposal(DestinationPayload),
    DestinationConfirmed(DestinationPayload),
    UserArrived(ArrivalPayload),
}

impl GroupEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            GroupEvent::LocationUpdate(_) => EventType::LocationUpdate,
            GroupEvent::GeofenceAlert(_) => EventType::GeofenceAlert,
            GroupEvent::GeofenceCleared(_) => EventType::GeofenceCleared,
            GroupEvent::DestinationProposal(_) => EventType::DestinationProposal,
            GroupEvent::DestinationConfirmed(_) => EventType::DestinationConfirmed,
            GroupEvent::UserArrived(_) => EventType::UserArrived,
        }
    }

    /// Members whose display names this event carries
    pub fn member_ids(&self) -> Vec<&MemberId> {
        match self {
            GroupEvent::LocationUpdate(p) => vec![&p.member_id],
            GroupEvent::GeofenceAlert(p) | GroupEvent::GeofenceCleared(p) => {
                vec![&p.member_id, &p.nearby_member_id]
            }
            GroupEvent::UserArrived(p) => vec![&p.member_id],
            GroupEvent::DestinationProposal(_) | GroupEvent::DestinationConfirmed(_) => vec![],
        }
    }

    /// Fill display names and human-readable messages once names are resolved.
    /// Unknown members fall back to their id in messages.
    pub fn apply_names(&mut self, names: &HashMap<MemberId, String>) {
        let label = |id: &MemberId| names.get(id).cloned().unwrap_or_else(|| id.to_string());
        match self {
            GroupEvent::LocationUpdate(p) => {
                p.display_name = names.get(&p.member_id).cloned();
            }
            GroupEvent::GeofenceAlert(p) => {
                p.member_name = names.get(&p.member_id).cloned();
                p.nearby_member_name = names.get(&p.nearby_member_id).cloned();
                p.message = format!(
                    "{} is within {} km!",
                    label(&p.nearby_member_id),
                    p.radius_km
                );
            }
            GroupEvent::GeofenceCleared(p) => {
                p.member_name = names.get(&p.member_id).cloned();
                p.nearby_member_name = names.get(&p.nearby_member_id).cloned();
                p.message = format!(
                    "{} is no longer within {} km",
                    label(&p.nearby_member_id),
                    p.radius_km
                );
            }
            GroupEvent::UserArrived(p) => {
                p.display_name = names.get(&p.member_id).cloned();
                p.message = format!("{} has reached the destination!", label(&p.member_id));
            }
            GroupEvent::DestinationProposal(_) | GroupEvent::DestinationConfirmed(_) => {}
        }
    }
}

/// Envelope delivered to subscribers.
///
/// `seq` is assigned per group while the group lock is held, so it follows
/// the order in which state changed even though fan-out happens later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubMessage {
    pub group_id: GroupId,
    pub seq: u64,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: GroupEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival() -> GroupEvent {
        GroupEvent::UserArrived(ArrivalPayload {
            member_id: MemberId::new("m1"),
            display_name: None,
            lat: 9.93,
            lng: 78.12,
            message: String::new(),
        })
    }

    #[test]
    fn test_event_serialization_uses_wire_names() {
        let json = serde_json::to_value(arrival()).unwrap();
        assert_eq!(json["event"], "userArrived");
        assert_eq!(json["data"]["memberId"], "m1");
        assert_eq!(arrival().event_type().as_str(), "userArrived");
    }

    #[test]
    fn test_apply_names_builds_messages() {
        let mut names = HashMap::new();
        names.insert(MemberId::new("m1"), "Asha".to_string());

        let mut event = arrival();
        event.apply_names(&names);
        match event {
            GroupEvent::UserArrived(p) => {
                assert_eq!(p.display_name.as_deref(), Some("Asha"));
                assert_eq!(p.message, "Asha has reached the destination!");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_hub_message_flattens_event() {
        let msg = HubMessage {
            group_id: GroupId::new("g1"),
            seq: 7,
            emitted_at: Utc::now(),
            event: arrival(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["groupId"], "g1");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["event"], "userArrived");
    }
}
