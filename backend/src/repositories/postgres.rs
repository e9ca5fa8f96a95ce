//! PostgreSQL ride storage.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, PgPool, Postgres, Row, Transaction};
use tracing::Instrument;

use super::ride_store::{ChangeSet, RideStore, StoredRide};
use super::transaction::{begin_transaction, commit_transaction};
use crate::models::{
    activity::ActivityEvent,
    attendance::AttendanceRecord,
    checkpoint::Checkpoint,
    location::LocationSample,
    participant::Participant,
    ride::Ride,
};
use crate::types::RideId;

const RIDE_COLUMNS: &str = "id, group_id, name, status, max_participants, scheduled_end_at, \
     created_at, started_at, ended_at";
const CHECKPOINT_COLUMNS: &str =
    "id, ride_id, kind, latitude, longitude, radius_m, position, created_at";
const PARTICIPANT_COLUMNS: &str = "id, ride_id, identity_id, role, joined_at, left_at";
const SAMPLE_COLUMNS: &str = "id, ride_id, participant_id, latitude, longitude, heading, speed, \
     accuracy, recorded_at, received_at";
const ATTENDANCE_COLUMNS: &str = "ride_id, participant_id, checkpoint_id, status, reached_at, \
     latitude, longitude, distance_traveled_m, source";
const ACTIVITY_COLUMNS: &str = "id, ride_id, sequence, activity_type, actor_id, checkpoint_id, \
     message, payload, created_at";

#[derive(Debug, Clone)]
pub struct PgRideStore {
    pool: PgPool,
}

impl PgRideStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, ride_id: RideId) -> anyhow::Result<Option<StoredRide>> {
        let query = format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS);
        let Some(row) = sqlx::query(&query)
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let ride = ride_from_row(&row)?;

        let query = format!(
            "SELECT {} FROM ride_checkpoints WHERE ride_id = $1 ORDER BY position",
            CHECKPOINT_COLUMNS
        );
        let checkpoints = sqlx::query(&query)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(checkpoint_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let query = format!(
            "SELECT {} FROM ride_participants WHERE ride_id = $1 ORDER BY joined_at",
            PARTICIPANT_COLUMNS
        );
        let participants = sqlx::query(&query)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(participant_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let query = format!(
            "SELECT {} FROM attendance_records WHERE ride_id = $1",
            ATTENDANCE_COLUMNS
        );
        let attendance = sqlx::query(&query)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(attendance_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let query = format!(
            "SELECT DISTINCT ON (participant_id) {} FROM location_samples \
             WHERE ride_id = $1 ORDER BY participant_id, recorded_at DESC",
            SAMPLE_COLUMNS
        );
        let latest_samples = sqlx::query(&query)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(sample_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let query = format!(
            "SELECT {} FROM ride_activities WHERE ride_id = $1 ORDER BY sequence",
            ACTIVITY_COLUMNS
        );
        let activities = sqlx::query(&query)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(activity_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(StoredRide {
            ride,
            checkpoints,
            participants,
            attendance,
            latest_samples,
            activities,
        }))
    }
}

#[async_trait]
impl RideStore for PgRideStore {
    async fn load_ride(&self, ride_id: RideId) -> anyhow::Result<Option<StoredRide>> {
        self.load(ride_id)
            .instrument(tracing::debug_span!("pg_load_ride", %ride_id))
            .await
    }

    async fn commit(&self, ride_id: RideId, changes: &ChangeSet) -> anyhow::Result<()> {
        write_changes(&self.pool, changes)
            .instrument(tracing::debug_span!("pg_commit", %ride_id))
            .await
    }
}

async fn write_changes(pool: &PgPool, changes: &ChangeSet) -> anyhow::Result<()> {
    let mut tx = begin_transaction(pool).await?;

    if let Some(ride) = &changes.ride {
        upsert_ride(&mut tx, ride).await?;
    }
    for checkpoint in &changes.checkpoints {
        insert_checkpoint(&mut tx, checkpoint).await?;
    }
    // Order matters: a demoted lead must be written before the promoted one.
    for participant in &changes.participants {
        upsert_participant(&mut tx, participant).await?;
    }
    for sample in &changes.samples {
        insert_sample(&mut tx, sample).await?;
    }
    for record in &changes.attendance {
        upsert_attendance(&mut tx, record).await?;
    }
    for event in &changes.activities {
        insert_activity(&mut tx, event).await?;
    }

    commit_transaction(tx).await
}

async fn upsert_ride(tx: &mut Transaction<'_, Postgres>, ride: &Ride) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO rides (id, group_id, name, status, max_participants, scheduled_end_at, \
         created_at, started_at, ended_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, \
         started_at = EXCLUDED.started_at, ended_at = EXCLUDED.ended_at",
    )
    .bind(ride.id)
    .bind(ride.group_id)
    .bind(&ride.name)
    .bind(ride.status.as_str())
    .bind(ride.max_participants)
    .bind(ride.scheduled_end_at)
    .bind(ride.created_at)
    .bind(ride.started_at)
    .bind(ride.ended_at)
    .execute(&mut **tx)
    .await
    .context("upsert ride")?;
    Ok(())
}

async fn insert_checkpoint(
    tx: &mut Transaction<'_, Postgres>,
    checkpoint: &Checkpoint,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO ride_checkpoints (id, ride_id, kind, latitude, longitude, radius_m, \
         position, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(checkpoint.id)
    .bind(checkpoint.ride_id)
    .bind(checkpoint.kind.as_str())
    .bind(checkpoint.latitude)
    .bind(checkpoint.longitude)
    .bind(checkpoint.radius_m)
    .bind(checkpoint.position)
    .bind(checkpoint.created_at)
    .execute(&mut **tx)
    .await
    .context("insert checkpoint")?;
    Ok(())
}

async fn upsert_participant(
    tx: &mut Transaction<'_, Postgres>,
    participant: &Participant,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO ride_participants (id, ride_id, identity_id, role, joined_at, left_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role, left_at = EXCLUDED.left_at",
    )
    .bind(participant.id)
    .bind(participant.ride_id)
    .bind(participant.identity_id)
    .bind(participant.role.as_str())
    .bind(participant.joined_at)
    .bind(participant.left_at)
    .execute(&mut **tx)
    .await
    .context("upsert participant")?;
    Ok(())
}

async fn insert_sample(
    tx: &mut Transaction<'_, Postgres>,
    sample: &LocationSample,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO location_samples (id, ride_id, participant_id, latitude, longitude, \
         heading, speed, accuracy, recorded_at, received_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(sample.id)
    .bind(sample.ride_id)
    .bind(sample.participant_id)
    .bind(sample.latitude)
    .bind(sample.longitude)
    .bind(sample.heading)
    .bind(sample.speed)
    .bind(sample.accuracy)
    .bind(sample.recorded_at)
    .bind(sample.received_at)
    .execute(&mut **tx)
    .await
    .context("insert location sample")?;
    Ok(())
}

async fn upsert_attendance(
    tx: &mut Transaction<'_, Postgres>,
    record: &AttendanceRecord,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO attendance_records (ride_id, participant_id, checkpoint_id, status, \
         reached_at, latitude, longitude, distance_traveled_m, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (participant_id, checkpoint_id) DO UPDATE SET status = EXCLUDED.status, \
         reached_at = EXCLUDED.reached_at, latitude = EXCLUDED.latitude, \
         longitude = EXCLUDED.longitude, distance_traveled_m = EXCLUDED.distance_traveled_m, \
         source = EXCLUDED.source",
    )
    .bind(record.ride_id)
    .bind(record.participant_id)
    .bind(record.checkpoint_id)
    .bind(record.status.as_str())
    .bind(record.reached_at)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.distance_traveled_m)
    .bind(record.source.as_str())
    .execute(&mut **tx)
    .await
    .context("upsert attendance record")?;
    Ok(())
}

async fn insert_activity(
    tx: &mut Transaction<'_, Postgres>,
    event: &ActivityEvent,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO ride_activities (id, ride_id, sequence, activity_type, actor_id, \
         checkpoint_id, message, payload, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(event.id)
    .bind(event.ride_id)
    .bind(event.sequence)
    .bind(event.activity_type.as_str())
    .bind(event.actor_id)
    .bind(event.checkpoint_id)
    .bind(&event.message)
    .bind(Json(&event.payload))
    .bind(event.created_at)
    .execute(&mut **tx)
    .await
    .context("insert activity")?;
    Ok(())
}

fn ride_from_row(row: &PgRow) -> anyhow::Result<Ride> {
    let status: String = row.try_get("status")?;
    Ok(Ride {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        max_participants: row.try_get("max_participants")?,
        scheduled_end_at: row.try_get("scheduled_end_at")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
    })
}

fn checkpoint_from_row(row: &PgRow) -> anyhow::Result<Checkpoint> {
    let kind: String = row.try_get("kind")?;
    Ok(Checkpoint {
        id: row.try_get("id")?,
        ride_id: row.try_get("ride_id")?,
        kind: kind.parse()?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        radius_m: row.try_get("radius_m")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
    })
}

fn participant_from_row(row: &PgRow) -> anyhow::Result<Participant> {
    let role: String = row.try_get("role")?;
    Ok(Participant {
        id: row.try_get("id")?,
        ride_id: row.try_get("ride_id")?,
        identity_id: row.try_get("identity_id")?,
        role: role.parse()?,
        joined_at: row.try_get("joined_at")?,
        left_at: row.try_get("left_at")?,
    })
}

fn sample_from_row(row: &PgRow) -> anyhow::Result<LocationSample> {
    Ok(LocationSample {
        id: row.try_get("id")?,
        ride_id: row.try_get("ride_id")?,
        participant_id: row.try_get("participant_id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        heading: row.try_get("heading")?,
        speed: row.try_get("speed")?,
        accuracy: row.try_get("accuracy")?,
        recorded_at: row.try_get("recorded_at")?,
        received_at: row.try_get("received_at")?,
    })
}

fn attendance_from_row(row: &PgRow) -> anyhow::Result<AttendanceRecord> {
    let status: String = row.try_get("status")?;
    let source: String = row.try_get("source")?;
    Ok(AttendanceRecord {
        ride_id: row.try_get("ride_id")?,
        participant_id: row.try_get("participant_id")?,
        checkpoint_id: row.try_get("checkpoint_id")?,
        status: status.parse()?,
        reached_at: row.try_get("reached_at")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        distance_traveled_m: row.try_get("distance_traveled_m")?,
        source: source.parse()?,
    })
}

fn activity_from_row(row: &PgRow) -> anyhow::Result<ActivityEvent> {
    let activity_type: String = row.try_get("activity_type")?;
    let payload: Json<serde_json::Value> = row.try_get("payload")?;
    Ok(ActivityEvent {
        id: row.try_get("id")?,
        ride_id: row.try_get("ride_id")?,
        sequence: row.try_get("sequence")?,
        activity_type: activity_type.parse()?,
        actor_id: row.try_get("actor_id")?,
        checkpoint_id: row.try_get("checkpoint_id")?,
        message: row.try_get("message")?,
        payload: payload.0,
        created_at: row.try_get("created_at")?,
    })
}
