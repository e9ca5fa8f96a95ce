//! Read model served to a rider's live map.

use serde::Serialize;

use super::session::RideState;
use super::track::Track;
use crate::models::{
    attendance::AttendanceRecord, checkpoint::Checkpoint, location::LocationSample,
    participant::Participant, ride::Ride,
};
use crate::types::ParticipantId;

/// Position and attendance of one participant as shown on the live map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiderStatus {
    pub participant: Participant,
    pub location: Option<LocationSample>,
    pub attendance: Vec<AttendanceRecord>,
}

/// Everything a participant's live screen needs in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRide {
    pub ride: Ride,
    pub checkpoints: Vec<Checkpoint>,
    pub lead: Option<Participant>,
    pub riders: Vec<RiderStatus>,
    pub my_attendance: Vec<AttendanceRecord>,
    pub last_sequence: i64,
}

impl LiveRide {
    /// Current participants only. `viewer` selects `my_attendance`.
    pub(crate) fn project(
        state: &RideState,
        viewer: Option<ParticipantId>,
        last_sequence: i64,
    ) -> Self {
        let riders = state
            .participants
            .iter()
            .filter(|p| p.is_current())
            .map(|p| RiderStatus {
                participant: p.clone(),
                location: state.tracks.get(&p.id).and_then(Track::latest).cloned(),
                attendance: state.records_for(p.id),
            })
            .collect();
        Self {
            ride: state.ride.clone(),
            checkpoints: state.checkpoints.clone(),
            lead: state.current_lead().cloned(),
            riders,
            my_attendance: viewer.map(|id| state.records_for(id)).unwrap_or_default(),
            last_sequence,
        }
    }
}
