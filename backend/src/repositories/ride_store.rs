//! Storage port for ride sessions.
//!
//! Every logical coordination step is persisted as one [`ChangeSet`] so an
//! adapter can write it atomically. This trait can be mocked using mockall
//! for testing purposes.

use async_trait::async_trait;

use crate::models::{
    activity::ActivityEvent, attendance::AttendanceRecord, checkpoint::Checkpoint,
    location::LocationSample, participant::Participant, ride::Ride,
};
use crate::types::RideId;

/// Durable state of one ride as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRide {
    pub ride: Ride,
    pub checkpoints: Vec<Checkpoint>,
    pub participants: Vec<Participant>,
    pub attendance: Vec<AttendanceRecord>,
    /// Most recent sample per participant.
    pub latest_samples: Vec<LocationSample>,
    /// Whole feed, ordered by sequence.
    pub activities: Vec<ActivityEvent>,
}

/// Writes produced by one coordination step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Ride header to insert or update.
    pub ride: Option<Ride>,
    pub checkpoints: Vec<Checkpoint>,
    /// Participants to insert or update by id.
    pub participants: Vec<Participant>,
    pub samples: Vec<LocationSample>,
    /// Attendance records to insert or replace by (participant, checkpoint).
    pub attendance: Vec<AttendanceRecord>,
    pub activities: Vec<ActivityEvent>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.ride.is_none()
            && self.checkpoints.is_empty()
            && self.participants.is_empty()
            && self.samples.is_empty()
            && self.attendance.is_empty()
            && self.activities.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Load a ride with everything needed to resume coordinating it.
    async fn load_ride(&self, ride_id: RideId) -> anyhow::Result<Option<StoredRide>>;

    /// Persist all writes of one step, all or nothing.
    async fn commit(&self, ride_id: RideId, changes: &ChangeSet) -> anyhow::Result<()>;
}
