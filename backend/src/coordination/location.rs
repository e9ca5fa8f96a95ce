use serde::Serialize;

use super::attendance::{auto_arrival, ArrivalFacts};
use super::error::{RideError, RideResult};
use super::geofence::detect_arrivals;
use super::payload::ArrivalMethod;
use super::session::RideSession;
use super::settings::CoordinationSettings;
use super::track::sample_point;
use crate::models::{
    attendance::AttendanceRecord,
    location::{LocationFix, LocationSample},
    ride::RideStatus,
};
use crate::repositories::ChangeSet;
use crate::types::ParticipantId;
use crate::validation::rules;

/// Result of a location submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LocationOutcome {
    /// Stored, with the checkpoints it attained.
    Accepted {
        sample: LocationSample,
        arrivals: Vec<AttendanceRecord>,
    },
    /// Identical to the stored latest sample; nothing changed.
    Duplicate { sample: LocationSample },
}

impl LocationOutcome {
    pub fn sample(&self) -> &LocationSample {
        match self {
            LocationOutcome::Accepted { sample, .. } | LocationOutcome::Duplicate { sample } => {
                sample
            }
        }
    }

    pub fn arrivals(&self) -> &[AttendanceRecord] {
        match self {
            LocationOutcome::Accepted { arrivals, .. } => arrivals,
            LocationOutcome::Duplicate { .. } => &[],
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LocationOutcome::Duplicate { .. })
    }
}

/// Accepts position samples and runs geofence detection on them.
pub struct LocationIngestor<'a> {
    session: &'a RideSession,
}

impl<'a> LocationIngestor<'a> {
    pub(crate) fn new(session: &'a RideSession) -> Self {
        Self { session }
    }

    /// Stores `fix` as the participant's latest position and records every
    /// checkpoint it attains, all in one step.
    ///
    /// A fix identical to the stored latest one is absorbed as a duplicate.
    /// Any other fix whose `recorded_at` is not newer is rejected.
    pub async fn submit(
        &self,
        participant_id: ParticipantId,
        fix: LocationFix,
    ) -> RideResult<LocationOutcome> {
        let session = self.session;
        let ride_id = session.ride_id();

        let gate = session.lock().await;
        let now = session.now();
        let (changes, drafts, sample, arrivals) = {
            let state = session.read_state();
            state.ensure_status("submit location", RideStatus::Active)?;
            validate_fix(&fix, now, session.settings())?;
            let participant = state.current_participant(participant_id)?;

            let track = state.tracks.get(&participant_id);
            if let Some(latest) = track.and_then(|t| t.latest()) {
                if latest.is_same_fix(&fix) {
                    tracing::debug!(%ride_id, %participant_id, "duplicate location sample");
                    return Ok(LocationOutcome::Duplicate {
                        sample: latest.clone(),
                    });
                }
                if fix.recorded_at <= latest.recorded_at {
                    tracing::debug!(
                        %ride_id,
                        %participant_id,
                        recorded_at = %fix.recorded_at,
                        latest = %latest.recorded_at,
                        "rejected out-of-order location sample"
                    );
                    return Err(RideError::validation(format!(
                        "recorded_at {} is not newer than the latest sample at {}",
                        fix.recorded_at, latest.recorded_at
                    )));
                }
            }

            let sample = LocationSample::from_fix(ride_id, participant_id, &fix, now);
            let position = sample_point(&sample);
            let traveled = track.map(|t| t.traveled_since_arrival(t.odometer_after(position)));

            let mut arrivals = Vec::new();
            let mut drafts = Vec::new();
            for decision in detect_arrivals(position, state.unattained(participant_id)) {
                let (record, draft) = auto_arrival(
                    participant,
                    ArrivalFacts {
                        checkpoint: decision.checkpoint,
                        reached_at: sample.recorded_at,
                        position: Some(position),
                        distance_traveled_m: Some(traveled.unwrap_or(0.0)),
                        method: ArrivalMethod::Geofence,
                    },
                );
                arrivals.push(record);
                drafts.push(draft);
            }

            let changes = ChangeSet {
                samples: vec![sample.clone()],
                attendance: arrivals.clone(),
                ..ChangeSet::default()
            };
            (changes, drafts, sample, arrivals)
        };

        session.commit(&gate, changes, drafts, now).await?;
        for record in &arrivals {
            tracing::info!(
                %ride_id,
                %participant_id,
                checkpoint_id = %record.checkpoint_id,
                "checkpoint reached"
            );
        }
        Ok(LocationOutcome::Accepted { sample, arrivals })
    }
}

fn validate_fix(
    fix: &LocationFix,
    now: chrono::DateTime<chrono::Utc>,
    settings: &CoordinationSettings,
) -> RideResult<()> {
    rules::validate_coordinates(fix.latitude, fix.longitude)?;
    if let Some(heading) = fix.heading {
        rules::validate_heading(heading)?;
    }
    for value in [fix.speed, fix.accuracy].into_iter().flatten() {
        rules::validate_non_negative(value)?;
    }
    if fix.recorded_at > now + settings.max_future_skew {
        return Err(RideError::validation("recorded_at is too far in the future"));
    }
    Ok(())
}
