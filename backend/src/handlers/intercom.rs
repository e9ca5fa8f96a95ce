use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::Caller,
    models::{
        intercom::IntercomStatus,
        participant::{Participant, SetLeadPayload},
    },
    services::intercom_token::{remaining_seconds, SignedGrant},
    state::AppState,
    types::RideId,
};

#[derive(Debug, Serialize)]
pub struct IntercomTokenResponse {
    #[serde(flatten)]
    pub signed: SignedGrant,
    pub expires_in: i64,
}

pub async fn set_lead(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
    Json(payload): Json<SetLeadPayload>,
) -> Result<Json<Participant>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let lead = session
        .intercom()
        .set_lead(caller.identity_id, payload.participant_id)
        .await?;
    Ok(Json(lead))
}

/// Returns the demoted participant, or `null` when there was no lead.
pub async fn remove_lead(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<Option<Participant>>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let demoted = session.intercom().remove_lead(caller.identity_id).await?;
    Ok(Json(demoted))
}

pub async fn get_intercom_token(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<IntercomTokenResponse>, AppError> {
    let session = state.rides.get(ride_id).await?;
    let participant = session.current_participant_for(caller.identity_id)?;
    let grant = session.intercom().issue_grant(participant.id)?;
    let expires_in = remaining_seconds(&grant, grant.issued_at);
    let signed = state.signer.sign(grant)?;
    Ok(Json(IntercomTokenResponse { signed, expires_in }))
}

pub async fn get_intercom_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(ride_id): Path<RideId>,
) -> Result<Json<IntercomStatus>, AppError> {
    let session = state.rides.get(ride_id).await?;
    session.authorize_viewer(caller.identity_id).await?;
    Ok(Json(session.intercom().status()))
}
