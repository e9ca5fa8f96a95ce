//! In-process ride storage. Used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ride_store::{ChangeSet, RideStore, StoredRide};
use crate::models::{
    activity::ActivityEvent, attendance::AttendanceRecord, checkpoint::Checkpoint,
    location::LocationSample, participant::Participant, ride::Ride,
};
use crate::types::RideId;

#[derive(Debug, Clone)]
struct RideRows {
    ride: Ride,
    checkpoints: Vec<Checkpoint>,
    participants: Vec<Participant>,
    samples: Vec<LocationSample>,
    attendance: Vec<AttendanceRecord>,
    activities: Vec<ActivityEvent>,
}

#[derive(Debug, Default)]
pub struct InMemoryRideStore {
    rides: RwLock<HashMap<RideId, RideRows>>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples for a ride, including history.
    pub async fn sample_count(&self, ride_id: RideId) -> usize {
        let rides = self.rides.read().await;
        rides.get(&ride_id).map(|rows| rows.samples.len()).unwrap_or(0)
    }

    pub async fn activity_count(&self, ride_id: RideId) -> usize {
        let rides = self.rides.read().await;
        rides
            .get(&ride_id)
            .map(|rows| rows.activities.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn load_ride(&self, ride_id: RideId) -> anyhow::Result<Option<StoredRide>> {
        let rides = self.rides.read().await;
        let Some(rows) = rides.get(&ride_id) else {
            return Ok(None);
        };

        let mut latest: HashMap<_, &LocationSample> = HashMap::new();
        for sample in &rows.samples {
            let newer = latest
                .get(&sample.participant_id)
                .map_or(true, |current| sample.recorded_at > current.recorded_at);
            if newer {
                latest.insert(sample.participant_id, sample);
            }
        }

        let mut activities = rows.activities.clone();
        activities.sort_by_key(|event| event.sequence);

        Ok(Some(StoredRide {
            ride: rows.ride.clone(),
            checkpoints: rows.checkpoints.clone(),
            participants: rows.participants.clone(),
            attendance: rows.attendance.clone(),
            latest_samples: latest.into_values().cloned().collect(),
            activities,
        }))
    }

    async fn commit(&self, ride_id: RideId, changes: &ChangeSet) -> anyhow::Result<()> {
        let mut rides = self.rides.write().await;

        // Validate before touching anything so a failed commit leaves no trace.
        let existing = rides.get(&ride_id);
        if existing.is_none() && changes.ride.is_none() {
            anyhow::bail!("ride {} does not exist in storage", ride_id);
        }
        if let Some(rows) = existing {
            for event in &changes.activities {
                if rows
                    .activities
                    .iter()
                    .any(|stored| stored.sequence == event.sequence)
                {
                    anyhow::bail!(
                        "duplicate activity sequence {} for ride {}",
                        event.sequence,
                        ride_id
                    );
                }
            }
        }

        let rows = match rides.entry(ride_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let Some(ride) = changes.ride.clone() else {
                    anyhow::bail!("ride {} does not exist in storage", ride_id);
                };
                entry.insert(RideRows {
                    ride,
                    checkpoints: Vec::new(),
                    participants: Vec::new(),
                    samples: Vec::new(),
                    attendance: Vec::new(),
                    activities: Vec::new(),
                })
            }
        };

        if let Some(ride) = &changes.ride {
            rows.ride = ride.clone();
        }
        for checkpoint in &changes.checkpoints {
            if !rows.checkpoints.iter().any(|c| c.id == checkpoint.id) {
                rows.checkpoints.push(checkpoint.clone());
            }
        }
        for participant in &changes.participants {
            match rows.participants.iter_mut().find(|p| p.id == participant.id) {
                Some(stored) => *stored = participant.clone(),
                None => rows.participants.push(participant.clone()),
            }
        }
        rows.samples.extend(changes.samples.iter().cloned());
        for record in &changes.attendance {
            match rows.attendance.iter_mut().find(|r| r.key() == record.key()) {
                Some(stored) => *stored = record.clone(),
                None => rows.attendance.push(record.clone()),
            }
        }
        rows.activities.extend(changes.activities.iter().cloned());

        Ok(())
    }
}
