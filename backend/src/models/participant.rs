use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{intercom::IntercomCapability, UnknownVariant};
use crate::types::{ParticipantId, RideId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    #[default]
    Rider,
    Lead,
    Marshal,
    Sweep,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Rider => "rider",
            ParticipantRole::Lead => "lead",
            ParticipantRole::Marshal => "marshal",
            ParticipantRole::Sweep => "sweep",
        }
    }

    /// Audio capability a participant with this role receives.
    pub fn intercom_capability(&self) -> IntercomCapability {
        match self {
            ParticipantRole::Lead => IntercomCapability::PublishAndSubscribe,
            ParticipantRole::Rider | ParticipantRole::Marshal | ParticipantRole::Sweep => {
                IntercomCapability::SubscribeOnly
            }
        }
    }

    /// Ride staff may mark attendance for others without being group admins.
    pub fn can_mark_attendance(&self) -> bool {
        match self {
            ParticipantRole::Lead | ParticipantRole::Marshal | ParticipantRole::Sweep => true,
            ParticipantRole::Rider => false,
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rider" => Ok(ParticipantRole::Rider),
            "lead" => Ok(ParticipantRole::Lead),
            "marshal" => Ok(ParticipantRole::Marshal),
            "sweep" => Ok(ParticipantRole::Sweep),
            _ => Err(UnknownVariant::new("participant role", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub ride_id: RideId,
    pub identity_id: UserId,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(
        ride_id: RideId,
        identity_id: UserId,
        role: ParticipantRole,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            ride_id,
            identity_id,
            role,
            joined_at: now,
            left_at: None,
        }
    }

    /// A participant who has joined and not left.
    pub fn is_current(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn is_lead(&self) -> bool {
        self.is_current() && self.role == ParticipantRole::Lead
    }
}

/// Request to add someone to a ride. Without an identity the caller joins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinRidePayload {
    pub identity_id: Option<UserId>,
    #[serde(default)]
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRolePayload {
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetLeadPayload {
    pub participant_id: ParticipantId,
}
