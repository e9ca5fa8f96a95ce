use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use validator::Validate;

use super::UnknownVariant;
use crate::types::{CheckpointId, ParticipantId, RideId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            _ => Err(UnknownVariant::new("attendance status", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceSource {
    Auto,
    Manual,
}

impl AttendanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceSource::Auto => "auto",
            AttendanceSource::Manual => "manual",
        }
    }
}

impl FromStr for AttendanceSource {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(AttendanceSource::Auto),
            "manual" => Ok(AttendanceSource::Manual),
            _ => Err(UnknownVariant::new("attendance source", value)),
        }
    }
}

/// Durable fact that a participant reached, or was marked absent at, a
/// checkpoint. At most one record exists per (participant, checkpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub ride_id: RideId,
    pub participant_id: ParticipantId,
    pub checkpoint_id: CheckpointId,
    pub status: AttendanceStatus,
    pub reached_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Meters traveled since the participant's previous arrival.
    pub distance_traveled_m: Option<f64>,
    pub source: AttendanceSource,
}

impl AttendanceRecord {
    pub fn key(&self) -> (ParticipantId, CheckpointId) {
        (self.participant_id, self.checkpoint_id)
    }

    pub fn is_manual(&self) -> bool {
        self.source == AttendanceSource::Manual
    }
}

/// Explicit arrival by the caller, optionally with their position.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInPayload {
    pub checkpoint_id: CheckpointId,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceOverridePayload {
    pub participant_id: ParticipantId,
    pub checkpoint_id: CheckpointId,
    pub status: AttendanceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_status_serde_snake_case() {
        let s: AttendanceStatus = serde_json::from_str("\"absent\"").unwrap();
        assert_eq!(s, AttendanceStatus::Absent);
        let v = serde_json::to_value(AttendanceSource::Manual).unwrap();
        assert_eq!(v, serde_json::json!("manual"));
    }
}
