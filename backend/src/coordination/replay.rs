//! Rebuilds derived ride state from the activity feed alone.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use thiserror::Error;

use super::payload::{AttendancePayload, LeadChangedPayload, MembershipPayload};
use crate::models::{
    activity::{ActivityEvent, ActivityType},
    attendance::{AttendanceSource, AttendanceStatus},
    participant::ParticipantRole,
    ride::RideStatus,
};
use crate::types::{CheckpointId, ParticipantId};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("expected sequence {expected}, found {found}")]
    Gap { expected: i64, found: i64 },
    #[error("event {sequence} has no checkpoint reference")]
    MissingCheckpoint { sequence: i64 },
    #[error("event {sequence} has an unreadable payload")]
    Payload {
        sequence: i64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectedAttendance {
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
}

/// Ride state as implied by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedProjection {
    pub status: RideStatus,
    pub lead: Option<ParticipantId>,
    /// Participants who joined and have not left, with their role.
    pub members: BTreeMap<ParticipantId, ParticipantRole>,
    pub attendance: HashMap<(ParticipantId, CheckpointId), ProjectedAttendance>,
    pub last_sequence: i64,
}

impl Default for FeedProjection {
    fn default() -> Self {
        Self {
            status: RideStatus::Planned,
            lead: None,
            members: BTreeMap::new(),
            attendance: HashMap::new(),
            last_sequence: 0,
        }
    }
}

impl FeedProjection {
    /// Replays a whole feed scanned from sequence 1.
    pub fn replay<'a, I>(events: I) -> Result<Self, ReplayError>
    where
        I: IntoIterator<Item = &'a ActivityEvent>,
    {
        let mut projection = Self::default();
        for event in events {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    /// Folds the next event in. Events must arrive in sequence order.
    pub fn apply(&mut self, event: &ActivityEvent) -> Result<(), ReplayError> {
        let expected = self.last_sequence + 1;
        if event.sequence != expected {
            return Err(ReplayError::Gap {
                expected,
                found: event.sequence,
            });
        }

        match event.activity_type {
            ActivityType::RideStarted => self.status = RideStatus::Active,
            ActivityType::RideEnded => self.status = RideStatus::Completed,
            ActivityType::ParticipantJoined => {
                let payload: MembershipPayload = decode(event)?;
                self.members.insert(payload.participant_id, payload.role);
            }
            ActivityType::ParticipantLeft => {
                let payload: MembershipPayload = decode(event)?;
                self.members.remove(&payload.participant_id);
                if self.lead == Some(payload.participant_id) {
                    self.lead = None;
                }
            }
            ActivityType::LeadChanged => {
                let payload: LeadChangedPayload = decode(event)?;
                if let Some(previous) = payload.previous_lead {
                    self.set_role(previous, ParticipantRole::Rider);
                }
                if let Some(new_lead) = payload.new_lead {
                    self.set_role(new_lead, ParticipantRole::Lead);
                }
                self.lead = payload.new_lead;
            }
            ActivityType::RoleChanged => {
                let payload: MembershipPayload = decode(event)?;
                self.set_role(payload.participant_id, payload.role);
            }
            ActivityType::Arrival => {
                let payload: AttendancePayload = decode(event)?;
                let checkpoint_id = checkpoint_of(event)?;
                self.attendance
                    .entry((payload.participant_id, checkpoint_id))
                    .or_insert(ProjectedAttendance {
                        status: payload.status,
                        source: payload.source,
                    });
            }
            ActivityType::AttendanceOverridden => {
                let payload: AttendancePayload = decode(event)?;
                let checkpoint_id = checkpoint_of(event)?;
                self.attendance.insert(
                    (payload.participant_id, checkpoint_id),
                    ProjectedAttendance {
                        status: payload.status,
                        source: AttendanceSource::Manual,
                    },
                );
            }
            ActivityType::Alert => {}
        }

        self.last_sequence = event.sequence;
        Ok(())
    }

    fn set_role(&mut self, participant_id: ParticipantId, role: ParticipantRole) {
        if let Some(current) = self.members.get_mut(&participant_id) {
            *current = role;
        }
    }

    pub fn role_of(&self, participant_id: ParticipantId) -> Option<ParticipantRole> {
        self.members.get(&participant_id).copied()
    }
}

fn decode<T: DeserializeOwned>(event: &ActivityEvent) -> Result<T, ReplayError> {
    serde_json::from_value(event.payload.clone()).map_err(|source| ReplayError::Payload {
        sequence: event.sequence,
        source,
    })
}

fn checkpoint_of(event: &ActivityEvent) -> Result<CheckpointId, ReplayError> {
    event
        .checkpoint_id
        .ok_or(ReplayError::MissingCheckpoint {
            sequence: event.sequence,
        })
}
