use validator::Validate;

use super::error::{RideError, RideResult};
use super::payload::{self, AlertPayload};
use super::session::RideSession;
use crate::models::{
    activity::{ActivityEvent, ActivityType, NewActivity},
    alert::AlertRequest,
    ride::RideStatus,
};
use crate::repositories::ChangeSet;
use crate::types::ParticipantId;
use crate::validation::rules;

/// Records emergency and status alerts into the feed. Delivery to people is
/// done by a notification sink following the feed.
pub struct AlertBroadcaster<'a> {
    session: &'a RideSession,
}

impl<'a> AlertBroadcaster<'a> {
    pub(crate) fn new(session: &'a RideSession) -> Self {
        Self { session }
    }

    pub async fn raise(
        &self,
        participant_id: ParticipantId,
        request: AlertRequest,
    ) -> RideResult<ActivityEvent> {
        validate_request(&request)?;

        let session = self.session;
        let gate = session.lock().await;
        let now = session.now();
        let draft = {
            let state = session.read_state();
            state.ensure_status("raise alert", RideStatus::Active)?;
            let participant = state
                .participant(participant_id)
                .ok()
                .filter(|p| p.is_current())
                .ok_or_else(|| {
                    RideError::permission("only current participants can raise alerts")
                })?;

            let message = request
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(request.kind.default_message())
                .to_string();
            NewActivity::new(ActivityType::Alert, message)
                .actor(participant.identity_id)
                .payload(payload::to_value(&AlertPayload {
                    participant_id,
                    alert_kind: request.kind,
                    latitude: request.latitude,
                    longitude: request.longitude,
                }))
        };

        let event = session
            .commit(&gate, ChangeSet::default(), vec![draft], now)
            .await?
            .pop()
            .ok_or_else(|| RideError::Storage(anyhow::anyhow!("alert event was not recorded")))?;
        tracing::warn!(
            ride_id = %session.ride_id(),
            %participant_id,
            kind = request.kind.as_str(),
            sequence = event.sequence,
            "alert raised"
        );
        Ok(event)
    }
}

fn validate_request(request: &AlertRequest) -> RideResult<()> {
    request
        .validate()
        .map_err(|errors| RideError::validation(errors.to_string()))?;
    match (request.latitude, request.longitude) {
        (Some(latitude), Some(longitude)) => rules::validate_coordinates(latitude, longitude)?,
        (None, None) => {}
        _ => {
            return Err(RideError::validation(
                "latitude and longitude must be given together",
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::AlertKind;

    #[test]
    fn alert_position_must_be_complete() {
        let mut request = AlertRequest::new(AlertKind::Breakdown);
        assert!(validate_request(&request).is_ok());

        request.latitude = Some(12.97);
        assert!(validate_request(&request).unwrap_err().is_validation());

        request.longitude = Some(77.59);
        assert!(validate_request(&request).is_ok());

        request.message = Some(String::new());
        assert!(validate_request(&request).is_err());
    }
}
