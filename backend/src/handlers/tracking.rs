use axum::{
    extract::{Path, State},
    Json,
};

use super::common::validated;
use crate::{
    coordination::LocationOutcome,
    error::AppError,
    middleware::Caller,
    models::{
        attendance::{AttendanceOverridePayload, AttendanceRecord, CheckInPayload},
        location::LocationFix,
    },
    state::AppState,
    types::RideId,
    utils::geo::GeoPoint,
};

pub async fn submit_location(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(fix): Json<LocationFix>,
) -> Result<Json<LocationOutcome>, AppError> {
    let fix = validated(fix)?;
    let session = state.rides.get(ride_id).await?;
    let participant = session.current_participant_for(caller.identity_id)?;
    let outcome = session.locations().submit(participant.id, fix).await?;
    Ok(Json(outcome))
}

pub async fn check_in(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(payload): Json<CheckInPayload>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let payload = validated(payload)?;
    let location = match (payload.latitude, payload.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(vec![
                "latitude and longitude must be given together".to_string(),
            ]))
        }
    };
    let session = state.rides.get(ride_id).await?;
    let participant = session.current_participant_for(caller.identity_id)?;
    let record = session
        .attendance_tracker()
        .check_in(participant.id, payload.checkpoint_id, location)
        .await?;
    Ok(Json(record))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let session = state.rides.get(ride_id).await?;
    session.authorize_viewer(caller.identity_id).await?;
    Ok(Json(session.attendance()))
}

pub async fn override_attendance(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(payload): Json<AttendanceOverridePayload>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let record = session
        .attendance_tracker()
        .manual_override(
            caller.identity_id,
            payload.participant_id,
            payload.checkpoint_id,
            payload.status,
        )
        .await?;
    Ok(Json(record))
}
