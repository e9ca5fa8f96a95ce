//! Attendance records per (participant, checkpoint).
//!
//! Automatic arrivals never touch an existing record, so the first arrival
//! wins and manual records are final for automatic detection. Manual
//! overrides always write.

use chrono::{DateTime, Utc};

use super::error::{RideError, RideResult};
use super::payload::{self, ArrivalMethod, AttendancePayload};
use super::session::RideSession;
use crate::models::{
    activity::{ActivityType, NewActivity},
    attendance::{AttendanceRecord, AttendanceSource, AttendanceStatus},
    checkpoint::Checkpoint,
    participant::Participant,
    ride::RideStatus,
};
use crate::repositories::ChangeSet;
use crate::types::{CheckpointId, ParticipantId, UserId};
use crate::utils::geo::GeoPoint;
use crate::validation::rules;

pub(crate) struct ArrivalFacts<'a> {
    pub checkpoint: &'a Checkpoint,
    pub reached_at: DateTime<Utc>,
    pub position: Option<GeoPoint>,
    pub distance_traveled_m: Option<f64>,
    pub method: ArrivalMethod,
}

/// Builds the automatic PRESENT record for an arrival and its feed event.
pub(crate) fn auto_arrival(
    participant: &Participant,
    facts: ArrivalFacts<'_>,
) -> (AttendanceRecord, NewActivity) {
    let checkpoint = facts.checkpoint;
    let distance_m = facts.position.map(|position| {
        position.distance_to(&GeoPoint::new(checkpoint.latitude, checkpoint.longitude))
    });
    let record = AttendanceRecord {
        ride_id: checkpoint.ride_id,
        participant_id: participant.id,
        checkpoint_id: checkpoint.id,
        status: AttendanceStatus::Present,
        reached_at: facts.reached_at,
        latitude: facts.position.map(|p| p.latitude),
        longitude: facts.position.map(|p| p.longitude),
        distance_traveled_m: facts.distance_traveled_m,
        source: AttendanceSource::Auto,
    };
    let draft = NewActivity::new(
        ActivityType::Arrival,
        format!("Reached {} checkpoint", checkpoint.kind.label()),
    )
    .actor(participant.identity_id)
    .checkpoint(checkpoint.id)
    .payload(payload::to_value(&AttendancePayload {
        participant_id: participant.id,
        checkpoint_kind: checkpoint.kind,
        status: record.status,
        source: record.source,
        method: facts.method,
        distance_m,
        distance_traveled_m: facts.distance_traveled_m,
    }));
    (record, draft)
}

pub struct AttendanceTracker<'a> {
    session: &'a RideSession,
}

impl<'a> AttendanceTracker<'a> {
    pub(crate) fn new(session: &'a RideSession) -> Self {
        Self { session }
    }

    /// Records an automatic arrival. Returns the existing record unchanged
    /// when the pair already has one.
    pub async fn record_arrival(
        &self,
        participant_id: ParticipantId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
        location: Option<GeoPoint>,
    ) -> RideResult<AttendanceRecord> {
        self.arrive(
            "record arrival",
            participant_id,
            checkpoint_id,
            at,
            location,
            ArrivalMethod::Geofence,
        )
        .await
    }

    /// Explicit arrival by the participant. Same idempotency as automatic
    /// detection; a given position must be inside the checkpoint radius.
    pub async fn check_in(
        &self,
        participant_id: ParticipantId,
        checkpoint_id: CheckpointId,
        location: Option<GeoPoint>,
    ) -> RideResult<AttendanceRecord> {
        let at = self.session.now();
        self.arrive(
            "check in",
            participant_id,
            checkpoint_id,
            at,
            location,
            ArrivalMethod::CheckIn,
        )
        .await
    }

    async fn arrive(
        &self,
        operation: &'static str,
        participant_id: ParticipantId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
        location: Option<GeoPoint>,
        method: ArrivalMethod,
    ) -> RideResult<AttendanceRecord> {
        let session = self.session;
        let gate = session.lock().await;
        let now = session.now();
        let (changes, draft, record) = {
            let state = session.read_state();
            state.ensure_status(operation, RideStatus::Active)?;
            let participant = state.current_participant(participant_id)?;
            let checkpoint = state.checkpoint(checkpoint_id)?;
            if let Some(existing) = state.record(participant_id, checkpoint_id) {
                return Ok(existing.clone());
            }

            if let Some(position) = location {
                rules::validate_coordinates(position.latitude, position.longitude)?;
                let center = GeoPoint::new(checkpoint.latitude, checkpoint.longitude);
                let distance = position.distance_to(&center);
                if method == ArrivalMethod::CheckIn && distance > checkpoint.radius_m {
                    return Err(RideError::validation(format!(
                        "position is {:.0} m from the checkpoint, outside its {:.0} m radius",
                        distance, checkpoint.radius_m
                    )));
                }
            }

            let traveled = state
                .tracks
                .get(&participant_id)
                .map(|t| t.traveled_since_arrival(t.odometer_m()));
            let (record, draft) = auto_arrival(
                participant,
                ArrivalFacts {
                    checkpoint,
                    reached_at: at,
                    position: location,
                    distance_traveled_m: traveled,
                    method,
                },
            );
            let changes = ChangeSet {
                attendance: vec![record.clone()],
                ..ChangeSet::default()
            };
            (changes, draft, record)
        };

        session.commit(&gate, changes, vec![draft], now).await?;
        tracing::info!(
            ride_id = %session.ride_id(),
            %participant_id,
            %checkpoint_id,
            ?method,
            "checkpoint reached"
        );
        Ok(record)
    }

    /// Creates or replaces the record with a MANUAL one. Group admins and
    /// ride staff may override; once manual, automatic detection leaves the
    /// record alone.
    pub async fn manual_override(
        &self,
        actor: UserId,
        participant_id: ParticipantId,
        checkpoint_id: CheckpointId,
        status: AttendanceStatus,
    ) -> RideResult<AttendanceRecord> {
        let session = self.session;
        let is_admin = session.is_admin(actor).await?;

        let gate = session.lock().await;
        let now = session.now();
        let (changes, draft, record) = {
            let state = session.read_state();
            if !is_admin {
                let is_staff = state
                    .current_for_identity(actor)
                    .map_or(false, |p| p.role.can_mark_attendance());
                if !is_staff {
                    return Err(RideError::permission(
                        "only group admins and ride staff can override attendance",
                    ));
                }
            }
            state.ensure_status("override attendance", RideStatus::Active)?;
            let participant = state.participant(participant_id)?;
            let checkpoint = state.checkpoint(checkpoint_id)?;

            let record = AttendanceRecord {
                ride_id: session.ride_id(),
                participant_id,
                checkpoint_id,
                status,
                reached_at: now,
                latitude: None,
                longitude: None,
                distance_traveled_m: None,
                source: AttendanceSource::Manual,
            };
            let draft = NewActivity::new(
                ActivityType::AttendanceOverridden,
                format!(
                    "Marked {} at {} checkpoint",
                    status,
                    checkpoint.kind.label()
                ),
            )
            .actor(actor)
            .checkpoint(checkpoint_id)
            .payload(payload::to_value(&AttendancePayload {
                participant_id: participant.id,
                checkpoint_kind: checkpoint.kind,
                status,
                source: AttendanceSource::Manual,
                method: ArrivalMethod::Manual,
                distance_m: None,
                distance_traveled_m: None,
            }));
            let changes = ChangeSet {
                attendance: vec![record.clone()],
                ..ChangeSet::default()
            };
            (changes, draft, record)
        };

        session.commit(&gate, changes, vec![draft], now).await?;
        tracing::info!(
            ride_id = %session.ride_id(),
            %participant_id,
            %checkpoint_id,
            status = %status,
            "attendance overridden"
        );
        Ok(record)
    }
}
