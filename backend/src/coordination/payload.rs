//! Structured payloads carried by feed events. The feed alone must be enough
//! to rebuild attendance, membership and lead, so every payload names the
//! participant it concerns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    alert::AlertKind,
    attendance::{AttendanceSource, AttendanceStatus},
    checkpoint::CheckpointKind,
    participant::ParticipantRole,
};
use crate::types::{ParticipantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalMethod {
    Geofence,
    CheckIn,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipPayload {
    pub participant_id: ParticipantId,
    pub identity_id: UserId,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendancePayload {
    pub participant_id: ParticipantId,
    pub checkpoint_kind: CheckpointKind,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub method: ArrivalMethod,
    /// Distance from the checkpoint center when a position was known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_traveled_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadChangedPayload {
    pub previous_lead: Option<ParticipantId>,
    pub new_lead: Option<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub participant_id: ParticipantId,
    pub alert_kind: AlertKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Serializes a payload struct. None of them hold non-string map keys, so
/// this never yields `Null` in practice.
pub(crate) fn to_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}
