use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::common::validated;
use crate::{
    error::AppError,
    middleware::Caller,
    models::{
        activity::{ActivityEvent, FeedQuery},
        alert::AlertRequest,
    },
    state::AppState,
    types::RideId,
};

/// Feed page after `since`. With `wait_ms` the request is held until an
/// event arrives or the wait runs out.
pub async fn get_activities(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<ActivityEvent>>, AppError> {
    let session = state.rides.get(ride_id).await?;
    session.authorize_viewer(caller.identity_id).await?;
    Ok(Json(session.activities(&query).await))
}

pub async fn raise_alert(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(request): Json<AlertRequest>,
) -> Result<(StatusCode, Json<ActivityEvent>), AppError> {
    let request = validated(request)?;
    let session = state.rides.get(ride_id).await?;
    let participant = session.current_participant_for(caller.identity_id)?;
    let event = session.alerts().raise(participant.id, request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}
