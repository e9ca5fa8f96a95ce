//! Single-broadcaster arbitration for a ride's audio room.
//!
//! At most one current participant holds the LEAD role. Lead changes write the
//! demoted and the promoted participant in one step, so no reader ever sees
//! zero or two leads mid-swap. Grants are ephemeral decisions; signing them for
//! the media relay happens outside the core.

use super::error::RideResult;
use super::session::{lead_changed_draft, RideSession};
use crate::models::{
    intercom::{room_name, IntercomGrant, IntercomStatus, LeadInfo},
    participant::{Participant, ParticipantRole},
    ride::RideStatus,
};
use crate::repositories::ChangeSet;
use crate::types::{ParticipantId, UserId};

pub struct IntercomAuthority<'a> {
    session: &'a RideSession,
}

impl<'a> IntercomAuthority<'a> {
    pub(crate) fn new(session: &'a RideSession) -> Self {
        Self { session }
    }

    /// Makes `participant_id` the lead, demoting the current lead to rider.
    /// Setting the current lead again is a no-op.
    pub async fn set_lead(
        &self,
        actor: UserId,
        participant_id: ParticipantId,
    ) -> RideResult<Participant> {
        let session = self.session;
        session.require_admin(actor, "change the ride lead").await?;

        let gate = session.lock().await;
        let now = session.now();
        let (changes, draft, promoted, previous) = {
            let state = session.read_state();
            state.ensure_open("set lead")?;
            let target = state.current_participant(participant_id)?;
            if target.is_lead() {
                return Ok(target.clone());
            }

            let mut participants = Vec::with_capacity(2);
            let previous = state.current_lead().map(|lead| lead.id);
            if let Some(lead) = state.current_lead() {
                let mut demoted = lead.clone();
                demoted.role = ParticipantRole::Rider;
                participants.push(demoted);
            }
            let mut promoted = target.clone();
            promoted.role = ParticipantRole::Lead;
            participants.push(promoted.clone());

            let changes = ChangeSet {
                participants,
                ..ChangeSet::default()
            };
            let draft = lead_changed_draft(actor, previous, Some(promoted.id));
            (changes, draft, promoted, previous)
        };

        session.commit(&gate, changes, vec![draft], now).await?;
        tracing::info!(
            ride_id = %session.ride_id(),
            participant_id = %promoted.id,
            previous_lead = ?previous,
            "ride lead changed"
        );
        Ok(promoted)
    }

    /// Demotes the current lead, leaving the room without a broadcaster.
    /// Returns the demoted participant, or `None` when there was no lead.
    pub async fn remove_lead(&self, actor: UserId) -> RideResult<Option<Participant>> {
        let session = self.session;
        session.require_admin(actor, "change the ride lead").await?;

        let gate = session.lock().await;
        let now = session.now();
        let (changes, draft, demoted) = {
            let state = session.read_state();
            state.ensure_open("remove lead")?;
            let Some(lead) = state.current_lead() else {
                return Ok(None);
            };
            let mut demoted = lead.clone();
            demoted.role = ParticipantRole::Rider;
            let changes = ChangeSet {
                participants: vec![demoted.clone()],
                ..ChangeSet::default()
            };
            (changes, lead_changed_draft(actor, Some(lead.id), None), demoted)
        };

        session.commit(&gate, changes, vec![draft], now).await?;
        tracing::info!(
            ride_id = %session.ride_id(),
            participant_id = %demoted.id,
            "ride lead removed"
        );
        Ok(Some(demoted))
    }

    /// Decides what `participant_id` may do in the audio room right now.
    ///
    /// Only the lead may publish. The grant lives for the configured TTL,
    /// capped by the hard ceiling and by the scheduled end of the ride.
    pub fn issue_grant(&self, participant_id: ParticipantId) -> RideResult<IntercomGrant> {
        let session = self.session;
        let now = session.now();
        let state = session.read_state();
        state.ensure_status("issue intercom grant", RideStatus::Active)?;
        let participant = state.current_participant(participant_id)?;

        let mut expires_at = now + session.settings().effective_grant_ttl();
        if let Some(scheduled_end) = state.ride.scheduled_end_at {
            if scheduled_end > now {
                expires_at = expires_at.min(scheduled_end);
            }
        }

        let grant = IntercomGrant {
            ride_id: session.ride_id(),
            participant_id,
            identity_id: participant.identity_id,
            capability: participant.role.intercom_capability(),
            room: room_name(session.ride_id()),
            issued_at: now,
            expires_at,
        };
        tracing::debug!(
            ride_id = %grant.ride_id,
            %participant_id,
            capability = ?grant.capability,
            "intercom grant issued"
        );
        Ok(grant)
    }

    pub fn status(&self) -> IntercomStatus {
        let session = self.session;
        let state = session.read_state();
        IntercomStatus {
            ride_id: session.ride_id(),
            is_available: state.ride.is_active(),
            ride_status: state.ride.status,
            room: room_name(session.ride_id()),
            lead: state.current_lead().map(|lead| LeadInfo {
                participant_id: lead.id,
                identity_id: lead.identity_id,
            }),
        }
    }
}
