use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use super::UnknownVariant;
use crate::types::{ActivityId, CheckpointId, RideId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    RideStarted,
    RideEnded,
    ParticipantJoined,
    ParticipantLeft,
    Arrival,
    AttendanceOverridden,
    Alert,
    LeadChanged,
    RoleChanged,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::RideStarted => "ride_started",
            ActivityType::RideEnded => "ride_ended",
            ActivityType::ParticipantJoined => "participant_joined",
            ActivityType::ParticipantLeft => "participant_left",
            ActivityType::Arrival => "arrival",
            ActivityType::AttendanceOverridden => "attendance_overridden",
            ActivityType::Alert => "alert",
            ActivityType::LeadChanged => "lead_changed",
            ActivityType::RoleChanged => "role_changed",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ride_started" => Ok(ActivityType::RideStarted),
            "ride_ended" => Ok(ActivityType::RideEnded),
            "participant_joined" => Ok(ActivityType::ParticipantJoined),
            "participant_left" => Ok(ActivityType::ParticipantLeft),
            "arrival" => Ok(ActivityType::Arrival),
            "attendance_overridden" => Ok(ActivityType::AttendanceOverridden),
            "alert" => Ok(ActivityType::Alert),
            "lead_changed" => Ok(ActivityType::LeadChanged),
            "role_changed" => Ok(ActivityType::RoleChanged),
            _ => Err(UnknownVariant::new("activity type", value)),
        }
    }
}

/// Entry of a ride's activity feed. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: ActivityId,
    pub ride_id: RideId,
    /// Gapless, strictly increasing per ride, starting at 1.
    pub sequence: i64,
    pub activity_type: ActivityType,
    pub actor_id: Option<UserId>,
    pub checkpoint_id: Option<CheckpointId>,
    pub message: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// An event waiting for its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub actor_id: Option<UserId>,
    pub checkpoint_id: Option<CheckpointId>,
    pub message: String,
    pub payload: Value,
}

impl NewActivity {
    pub fn new(activity_type: ActivityType, message: impl Into<String>) -> Self {
        Self {
            activity_type,
            actor_id: None,
            checkpoint_id: None,
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn checkpoint(mut self, checkpoint_id: CheckpointId) -> Self {
        self.checkpoint_id = Some(checkpoint_id);
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Query parameters for reading the feed by cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedQuery {
    /// Return events with a sequence strictly greater than this (default: 0).
    #[serde(default)]
    pub since: i64,
    /// Maximum number of events to return (default: 50, max: 500).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Wait up to this many milliseconds for new events when none are ready.
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

fn default_limit() -> usize {
    50
}

pub const MAX_WAIT_MS: u64 = 30_000;

impl FeedQuery {
    /// Returns a clamped limit value (1..=500).
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 500)
    }

    /// Returns the cursor, floored at 0.
    pub fn since(&self) -> i64 {
        self.since.max(0)
    }

    pub fn wait_ms(&self) -> Option<u64> {
        self.wait_ms.map(|ms| ms.min(MAX_WAIT_MS))
    }
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            since: 0,
            limit: default_limit(),
            wait_ms: None,
        }
    }
}
