use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use validator::Validate;

use super::UnknownVariant;
use crate::types::{CheckpointId, RideId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Meetup,
    Stop,
    Destination,
    Disbursement,
}

impl CheckpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointKind::Meetup => "meetup",
            CheckpointKind::Stop => "stop",
            CheckpointKind::Destination => "destination",
            CheckpointKind::Disbursement => "disbursement",
        }
    }

    /// Human readable label used in feed messages.
    pub fn label(&self) -> &'static str {
        match self {
            CheckpointKind::Meetup => "Meetup",
            CheckpointKind::Stop => "Stop",
            CheckpointKind::Destination => "Destination",
            CheckpointKind::Disbursement => "Disbursement",
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "meetup" => Ok(CheckpointKind::Meetup),
            "stop" | "refreshment" => Ok(CheckpointKind::Stop),
            "destination" => Ok(CheckpointKind::Destination),
            "disbursement" => Ok(CheckpointKind::Disbursement),
            _ => Err(UnknownVariant::new("checkpoint kind", value)),
        }
    }
}

/// Fixed geographic point with a trigger radius. Immutable once the ride
/// leaves the planned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub ride_id: RideId,
    pub kind: CheckpointKind,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload describing a checkpoint to add to a planned ride.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCheckpoint {
    pub kind: CheckpointKind,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Falls back to the configured default radius when omitted.
    #[validate(range(exclusive_min = 0.0, max = 50000.0))]
    pub radius_m: Option<f64>,
}
