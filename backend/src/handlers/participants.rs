use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    middleware::Caller,
    models::participant::{JoinRidePayload, Participant, UpdateRolePayload},
    state::AppState,
    types::{ParticipantId, RideId},
};

/// Joins the caller, or adds someone else when the caller is a group admin.
pub async fn join_ride(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    body: Bytes,
) -> Result<(StatusCode, Json<Participant>), AppError> {
    // An empty body means the caller joins as a rider.
    let payload: JoinRidePayload = if body.is_empty() {
        JoinRidePayload::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };
    let identity_id = payload.identity_id.unwrap_or(caller.identity_id);
    let session = state.rides.get(ride_id).await?;
    let participant = session
        .add_participant(caller.identity_id, identity_id, payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    caller: Caller,
    Path((ride_id, participant_id)): Path<(RideId, ParticipantId)>,
) -> Result<Json<Participant>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let participant = session
        .remove_participant(caller.identity_id, participant_id)
        .await?;
    Ok(Json(participant))
}

/// Everyone who ever joined, including those who left.
pub async fn list_participants(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<Vec<Participant>>, AppError> {
    let session = state.rides.get(ride_id).await?;
    session.authorize_viewer(caller.identity_id).await?;
    Ok(Json(session.participants()))
}

pub async fn update_participant_role(
    State(state): State<AppState>,
    caller: Caller,
    Path((ride_id, participant_id)): Path<(RideId, ParticipantId)>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<Json<Participant>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let participant = session
        .set_role(caller.identity_id, participant_id, payload.role)
        .await?;
    Ok(Json(participant))
}
