use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, RideId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntercomCapability {
    PublishAndSubscribe,
    SubscribeOnly,
}

impl IntercomCapability {
    pub fn can_publish(&self) -> bool {
        matches!(self, IntercomCapability::PublishAndSubscribe)
    }
}

/// Audio room shared by every participant of a ride.
pub fn room_name(ride_id: RideId) -> String {
    format!("ride_{}", ride_id)
}

/// Decision about who may publish to a ride's audio room and until when.
/// Ephemeral; recreated on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomGrant {
    pub ride_id: RideId,
    pub participant_id: ParticipantId,
    pub identity_id: UserId,
    pub capability: IntercomCapability,
    pub room: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadInfo {
    pub participant_id: ParticipantId,
    pub identity_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomStatus {
    pub ride_id: RideId,
    pub is_available: bool,
    pub ride_status: super::ride::RideStatus,
    pub room: String,
    pub lead: Option<LeadInfo>,
}
