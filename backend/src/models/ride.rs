use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use validator::Validate;

use super::{checkpoint::NewCheckpoint, UnknownVariant};
use crate::types::{GroupId, RideId};

pub const DEFAULT_MAX_PARTICIPANTS: i32 = 30;

/// Lifecycle of a ride session. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Planned,
    Active,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Planned => "planned",
            RideStatus::Active => "active",
            RideStatus::Completed => "completed",
        }
    }

    /// Whether `next` is the single legal successor of `self`.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        next.predecessor() == Some(self)
    }

    /// The only status a ride may be in right before entering `self`.
    pub fn predecessor(self) -> Option<RideStatus> {
        match self {
            RideStatus::Planned => None,
            RideStatus::Active => Some(RideStatus::Planned),
            RideStatus::Completed => Some(RideStatus::Active),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "planned" => Ok(RideStatus::Planned),
            "active" => Ok(RideStatus::Active),
            "completed" => Ok(RideStatus::Completed),
            _ => Err(UnknownVariant::new("ride status", value)),
        }
    }
}

/// A ride session header. Checkpoints and participants are owned by the
/// session state and looked up by ride id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub group_id: GroupId,
    pub name: String,
    pub status: RideStatus,
    pub max_participants: i32,
    pub scheduled_end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn new(group_id: GroupId, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: RideId::new(),
            group_id,
            name,
            status: RideStatus::Planned,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            scheduled_end_at: None,
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RideStatus::Active
    }
}

/// Payload for creating a planned ride.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewRide {
    pub group_id: GroupId,
    #[validate(custom(function = crate::validation::rules::validate_ride_name))]
    pub name: String,
    #[validate(range(min = 1, max = 500))]
    pub max_participants: Option<i32>,
    pub scheduled_end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(nested)]
    pub checkpoints: Vec<NewCheckpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        assert!(RideStatus::Planned.can_transition_to(RideStatus::Active));
        assert!(RideStatus::Active.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::Planned.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::Active));
        assert!(!RideStatus::Active.can_transition_to(RideStatus::Planned));
        assert!(!RideStatus::Active.can_transition_to(RideStatus::Active));
    }

    #[test]
    fn status_parses_stored_values() {
        assert_eq!("ACTIVE".parse::<RideStatus>().unwrap(), RideStatus::Active);
        assert_eq!(
            "completed".parse::<RideStatus>().unwrap(),
            RideStatus::Completed
        );
        assert!("paused".parse::<RideStatus>().is_err());
    }

    #[test]
    fn new_ride_validates_name_and_checkpoints() {
        let payload: NewRide = serde_json::from_value(serde_json::json!({
            "group_id": GroupId::new(),
            "name": "  ",
            "checkpoints": [
                { "kind": "meetup", "latitude": 12.97, "longitude": 77.59, "radius_m": -1.0 }
            ]
        }))
        .unwrap();
        let errors = payload.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("checkpoints"));
    }
}
