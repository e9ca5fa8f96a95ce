use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::common::validated;
use crate::{
    coordination::LiveRide,
    error::AppError,
    middleware::Caller,
    models::{
        checkpoint::{Checkpoint, NewCheckpoint},
        ride::{NewRide, Ride},
    },
    state::AppState,
    types::RideId,
};

pub async fn create_ride(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<NewRide>,
) -> Result<(StatusCode, Json<LiveRide>), AppError> {
    let payload = validated(payload)?;
    let session = state
        .rides
        .create_ride(caller.identity_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(session.live_view(None))))
}

pub async fn add_checkpoint(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(payload): Json<NewCheckpoint>,
) -> Result<(StatusCode, Json<Checkpoint>), AppError> {
    let payload = validated(payload)?;
    let session = state.rides.get(ride_id).await?;
    let checkpoint = session.add_checkpoint(caller.identity_id, payload).await?;
    Ok((StatusCode::CREATED, Json(checkpoint)))
}

pub async fn activate_ride(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<Ride>, AppError> {
    let session = state.rides.get(ride_id).await?;
    Ok(Json(session.activate(caller.identity_id).await?))
}

pub async fn complete_ride(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<Ride>, AppError> {
    let session = state.rides.get(ride_id).await?;
    Ok(Json(session.complete(caller.identity_id).await?))
}

pub async fn get_live_ride(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<LiveRide>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let viewer = session.authorize_viewer(caller.identity_id).await?;
    Ok(Json(session.live_view(viewer.map(|p| p.id))))
}
