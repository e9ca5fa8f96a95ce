use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{LocationSampleId, ParticipantId, RideId};

/// A position report as sent by a participant's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LocationFix {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Direction of travel in degrees.
    #[validate(range(min = 0.0, max = 360.0))]
    pub heading: Option<f64>,
    /// Speed in km/h.
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
    /// Horizontal accuracy in meters.
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
    /// Device clock at the time of the fix.
    pub recorded_at: DateTime<Utc>,
}

/// An accepted position sample. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: LocationSampleId,
    pub ride_id: RideId,
    pub participant_id: ParticipantId,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn from_fix(
        ride_id: RideId,
        participant_id: ParticipantId,
        fix: &LocationFix,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LocationSampleId::new(),
            ride_id,
            participant_id,
            latitude: fix.latitude,
            longitude: fix.longitude,
            heading: fix.heading,
            speed: fix.speed,
            accuracy: fix.accuracy,
            recorded_at: fix.recorded_at,
            received_at,
        }
    }

    /// Same device timestamp and same position as `fix`.
    pub fn is_same_fix(&self, fix: &LocationFix) -> bool {
        self.recorded_at == fix.recorded_at
            && self.latitude == fix.latitude
            && self.longitude == fix.longitude
    }
}
