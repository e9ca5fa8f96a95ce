//! Per-ride session state and its lifecycle.
//!
//! A [`RideSession`] owns everything the coordination components read and
//! write for one ride. Every mutating step runs under the session's write gate:
//! it computes its writes from the current state, numbers its feed events,
//! persists both as one [`ChangeSet`], and only then applies them to memory and
//! publishes the events. Readers take the state lock briefly and never wait on
//! the gate, so they always see the last committed step.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use super::alert::AlertBroadcaster;
use super::attendance::AttendanceTracker;
use super::error::{RideError, RideResult};
use super::feed::ActivityFeed;
use super::intercom::IntercomAuthority;
use super::live_view::LiveRide;
use super::location::LocationIngestor;
use super::payload::{self, LeadChangedPayload, MembershipPayload};
use super::settings::CoordinationSettings;
use super::track::Track;
use crate::models::{
    activity::{ActivityEvent, ActivityType, FeedQuery, NewActivity},
    attendance::{AttendanceRecord, AttendanceSource, AttendanceStatus},
    checkpoint::{Checkpoint, NewCheckpoint},
    location::LocationSample,
    participant::{Participant, ParticipantRole},
    ride::{NewRide, Ride, RideStatus},
};
use crate::repositories::{ChangeSet, RideStore, StoredRide};
use crate::services::authorization::AccessPolicy;
use crate::types::{CheckpointId, GroupId, ParticipantId, RideId, UserId};
use crate::utils::time::Clock;
use crate::validation::rules;

/// Collaborators injected into every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn RideStore>,
    pub access: Arc<dyn AccessPolicy>,
    pub clock: Arc<dyn Clock>,
    pub settings: CoordinationSettings,
}

/// In-memory view of a ride. Only [`RideSession::commit`] mutates it.
#[derive(Debug, Clone)]
pub struct RideState {
    pub(crate) ride: Ride,
    pub(crate) checkpoints: Vec<Checkpoint>,
    pub(crate) participants: Vec<Participant>,
    pub(crate) attendance: HashMap<(ParticipantId, CheckpointId), AttendanceRecord>,
    pub(crate) tracks: HashMap<ParticipantId, Track>,
}

impl RideState {
    fn new(ride: Ride) -> Self {
        Self {
            ride,
            checkpoints: Vec::new(),
            participants: Vec::new(),
            attendance: HashMap::new(),
            tracks: HashMap::new(),
        }
    }

    fn restore(stored: StoredRide, history_limit: usize) -> Self {
        let mut state = Self::new(stored.ride);
        state.checkpoints = stored.checkpoints;
        state.checkpoints.sort_by_key(|c| c.position);
        state.participants = stored.participants;
        state.attendance = stored
            .attendance
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();
        for sample in stored.latest_samples {
            state
                .tracks
                .entry(sample.participant_id)
                .or_default()
                .push(sample, history_limit);
        }
        state
    }

    pub(crate) fn participant(&self, participant_id: ParticipantId) -> RideResult<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| RideError::not_found("participant"))
    }

    /// Like [`participant`](Self::participant), but a participant who left
    /// is a permission failure.
    pub(crate) fn current_participant(
        &self,
        participant_id: ParticipantId,
    ) -> RideResult<&Participant> {
        let participant = self.participant(participant_id)?;
        if !participant.is_current() {
            return Err(RideError::permission("participant has left the ride"));
        }
        Ok(participant)
    }

    pub(crate) fn current_for_identity(&self, identity_id: UserId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.identity_id == identity_id && p.is_current())
    }

    pub(crate) fn current_lead(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_lead())
    }

    pub(crate) fn current_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_current()).count()
    }

    pub(crate) fn checkpoint(&self, checkpoint_id: CheckpointId) -> RideResult<&Checkpoint> {
        self.checkpoints
            .iter()
            .find(|c| c.id == checkpoint_id)
            .ok_or_else(|| RideError::not_found("checkpoint"))
    }

    pub(crate) fn record(
        &self,
        participant_id: ParticipantId,
        checkpoint_id: CheckpointId,
    ) -> Option<&AttendanceRecord> {
        self.attendance.get(&(participant_id, checkpoint_id))
    }

    /// Checkpoints without any attendance record for the participant.
    pub(crate) fn unattained(
        &self,
        participant_id: ParticipantId,
    ) -> impl Iterator<Item = &Checkpoint> + '_ {
        self.checkpoints
            .iter()
            .filter(move |c| !self.attendance.contains_key(&(participant_id, c.id)))
    }

    pub(crate) fn ensure_status(
        &self,
        operation: &'static str,
        required: RideStatus,
    ) -> RideResult<()> {
        RideError::ensure_status(operation, self.ride.status, required)
    }

    /// Membership and lead changes are allowed until the ride completes.
    pub(crate) fn ensure_open(&self, operation: &'static str) -> RideResult<()> {
        if self.ride.status == RideStatus::Completed {
            return Err(RideError::State {
                operation,
                required: "planned or active",
                actual: self.ride.status,
            });
        }
        Ok(())
    }

    pub(crate) fn records_for(&self, participant_id: ParticipantId) -> Vec<AttendanceRecord> {
        let mut records: Vec<_> = self
            .attendance
            .values()
            .filter(|r| r.participant_id == participant_id)
            .cloned()
            .collect();
        self.sort_records(&mut records);
        records
    }

    fn sort_records(&self, records: &mut [AttendanceRecord]) {
        let position = |id: CheckpointId| {
            self.checkpoints
                .iter()
                .find(|c| c.id == id)
                .map_or(i32::MAX, |c| c.position)
        };
        records.sort_by(|a, b| {
            position(a.checkpoint_id)
                .cmp(&position(b.checkpoint_id))
                .then(a.reached_at.cmp(&b.reached_at))
        });
    }

    fn apply(&mut self, changes: &ChangeSet, history_limit: usize) {
        if let Some(ride) = &changes.ride {
            self.ride = ride.clone();
        }
        for checkpoint in &changes.checkpoints {
            if !self.checkpoints.iter().any(|c| c.id == checkpoint.id) {
                self.checkpoints.push(checkpoint.clone());
            }
        }
        self.checkpoints.sort_by_key(|c| c.position);
        for participant in &changes.participants {
            match self.participants.iter_mut().find(|p| p.id == participant.id) {
                Some(existing) => *existing = participant.clone(),
                None => self.participants.push(participant.clone()),
            }
        }
        for sample in &changes.samples {
            self.tracks
                .entry(sample.participant_id)
                .or_default()
                .push(sample.clone(), history_limit);
        }
        for record in &changes.attendance {
            if record.source == AttendanceSource::Auto && record.status == AttendanceStatus::Present
            {
                self.tracks
                    .entry(record.participant_id)
                    .or_default()
                    .mark_arrival();
            }
            self.attendance.insert(record.key(), record.clone());
        }
    }
}

pub struct RideSession {
    ride_id: RideId,
    group_id: GroupId,
    gate: Mutex<()>,
    state: RwLock<RideState>,
    feed: ActivityFeed,
    deps: SessionDeps,
}

impl RideSession {
    /// Creates a planned ride with its initial checkpoints. Requires admin
    /// rights on the owning group.
    pub async fn create(
        deps: SessionDeps,
        actor: UserId,
        payload: NewRide,
    ) -> RideResult<Arc<Self>> {
        rules::validate_ride_name(&payload.name)?;
        let is_admin = deps
            .access
            .is_group_admin(payload.group_id, actor)
            .await
            .map_err(RideError::Storage)?;
        if !is_admin {
            return Err(RideError::permission(
                "only group admins can create rides",
            ));
        }

        let now = deps.clock.now();
        let mut ride = Ride::new(payload.group_id, payload.name.trim().to_string(), now);
        if let Some(max) = payload.max_participants {
            if max < 1 {
                return Err(RideError::validation("max_participants must be positive"));
            }
            ride.max_participants = max;
        }
        ride.scheduled_end_at = payload.scheduled_end_at;

        let checkpoints = payload
            .checkpoints
            .iter()
            .enumerate()
            .map(|(position, new)| {
                build_checkpoint(ride.id, new, position as i32, &deps.settings, now)
            })
            .collect::<RideResult<Vec<_>>>()?;

        let changes = ChangeSet {
            ride: Some(ride.clone()),
            checkpoints: checkpoints.clone(),
            ..ChangeSet::default()
        };
        if let Err(err) = deps.store.commit(ride.id, &changes).await {
            tracing::error!(ride_id = %ride.id, error = %err, "failed to persist new ride");
            return Err(RideError::Storage(err));
        }

        tracing::info!(
            ride_id = %ride.id,
            group_id = %ride.group_id,
            checkpoints = checkpoints.len(),
            "ride created"
        );
        let mut state = RideState::new(ride.clone());
        state.apply(&changes, deps.settings.history_limit());
        Ok(Arc::new(Self::from_parts(state, ActivityFeed::new(ride.id), deps)))
    }

    /// Rebuilds a session from storage. `None` when the ride does not exist.
    pub async fn load(deps: SessionDeps, ride_id: RideId) -> RideResult<Option<Arc<Self>>> {
        let stored = match deps.store.load_ride(ride_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::error!(%ride_id, error = %err, "failed to load ride");
                return Err(RideError::Storage(err));
            }
        };
        let activities = stored.activities.clone();
        let feed = ActivityFeed::restore(ride_id, activities).map_err(|gap| {
            tracing::error!(%ride_id, error = %gap, "stored feed is corrupt");
            RideError::Storage(gap.into())
        })?;
        let state = RideState::restore(stored, deps.settings.history_limit());
        tracing::debug!(%ride_id, last_sequence = feed.last_sequence(), "ride loaded");
        Ok(Some(Arc::new(Self::from_parts(state, feed, deps))))
    }

    fn from_parts(state: RideState, feed: ActivityFeed, deps: SessionDeps) -> Self {
        Self {
            ride_id: state.ride.id,
            group_id: state.ride.group_id,
            gate: Mutex::new(()),
            state: RwLock::new(state),
            feed,
            deps,
        }
    }

    pub fn ride_id(&self) -> RideId {
        self.ride_id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn settings(&self) -> &CoordinationSettings {
        &self.deps.settings
    }

    pub fn locations(&self) -> LocationIngestor<'_> {
        LocationIngestor::new(self)
    }

    pub fn attendance_tracker(&self) -> AttendanceTracker<'_> {
        AttendanceTracker::new(self)
    }

    pub fn alerts(&self) -> AlertBroadcaster<'_> {
        AlertBroadcaster::new(self)
    }

    pub fn intercom(&self) -> IntercomAuthority<'_> {
        IntercomAuthority::new(self)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.deps.clock.now()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, RideState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RideState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) async fn is_admin(&self, actor: UserId) -> RideResult<bool> {
        self.deps
            .access
            .is_group_admin(self.group_id, actor)
            .await
            .map_err(|err| {
                tracing::error!(ride_id = %self.ride_id, error = %err, "authorization lookup failed");
                RideError::Storage(err)
            })
    }

    pub(crate) async fn require_admin(&self, actor: UserId, action: &str) -> RideResult<()> {
        if self.is_admin(actor).await? {
            Ok(())
        } else {
            Err(RideError::permission(format!(
                "only group admins can {}",
                action
            )))
        }
    }

    /// Persists one step and makes it visible. `gate` proves the caller holds
    /// the session write gate. On a storage failure nothing is applied and no
    /// sequence number is consumed.
    pub(crate) async fn commit(
        &self,
        gate: &MutexGuard<'_, ()>,
        mut changes: ChangeSet,
        drafts: Vec<NewActivity>,
        now: DateTime<Utc>,
    ) -> RideResult<Vec<ActivityEvent>> {
        changes.activities = self.feed.stage(gate, drafts, now);
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        if let Err(err) = self.deps.store.commit(self.ride_id, &changes).await {
            tracing::error!(ride_id = %self.ride_id, error = %err, "failed to persist ride changes");
            return Err(RideError::Storage(err));
        }
        self.write_state()
            .apply(&changes, self.deps.settings.history_limit());
        let events = std::mem::take(&mut changes.activities);
        self.feed.publish(gate, events.clone());
        Ok(events)
    }

    /// PLANNED -> ACTIVE. The ride must have at least one checkpoint.
    pub async fn activate(&self, actor: UserId) -> RideResult<Ride> {
        self.transition(actor, RideStatus::Active).await
    }

    /// ACTIVE -> COMPLETED. Terminal.
    pub async fn complete(&self, actor: UserId) -> RideResult<Ride> {
        self.transition(actor, RideStatus::Completed).await
    }

    async fn transition(&self, actor: UserId, next: RideStatus) -> RideResult<Ride> {
        let (operation, action) = match next {
            RideStatus::Active => ("activate ride", "start rides"),
            RideStatus::Completed => ("complete ride", "end rides"),
            RideStatus::Planned => ("reset ride", "reset rides"),
        };
        self.require_admin(actor, action).await?;

        let gate = self.lock().await;
        let now = self.now();
        let (ride, draft) = {
            let state = self.read_state();
            if !state.ride.status.can_transition_to(next) {
                return Err(RideError::State {
                    operation,
                    required: next.predecessor().map_or("none", |s| s.as_str()),
                    actual: state.ride.status,
                });
            }
            if next == RideStatus::Active && state.checkpoints.is_empty() {
                return Err(RideError::Precondition {
                    operation,
                    reason: "no checkpoints defined",
                });
            }

            let mut ride = state.ride.clone();
            ride.status = next;
            let draft = if next == RideStatus::Active {
                ride.started_at = Some(now);
                NewActivity::new(ActivityType::RideStarted, format!("{} has started", ride.name))
            } else {
                ride.ended_at = Some(now);
                NewActivity::new(ActivityType::RideEnded, format!("{} has ended", ride.name))
            };
            (ride, draft.actor(actor))
        };

        let changes = ChangeSet {
            ride: Some(ride.clone()),
            ..ChangeSet::default()
        };
        self.commit(&gate, changes, vec![draft], now).await?;
        tracing::info!(ride_id = %self.ride_id, status = %ride.status, "ride status changed");
        Ok(ride)
    }

    /// Adds `identity_id` to the ride. Joining yourself as a rider needs no
    /// admin rights; anything else does. Re-adding a current participant
    /// returns the existing one.
    pub async fn add_participant(
        &self,
        actor: UserId,
        identity_id: UserId,
        role: ParticipantRole,
    ) -> RideResult<Participant> {
        if actor != identity_id || role != ParticipantRole::Rider {
            self.require_admin(actor, "assign participants").await?;
        }

        let gate = self.lock().await;
        let now = self.now();
        let (participant, drafts) = {
            let state = self.read_state();
            state.ensure_open("add participant")?;
            if let Some(existing) = state.current_for_identity(identity_id) {
                return Ok(existing.clone());
            }
            if role == ParticipantRole::Lead && state.current_lead().is_some() {
                return Err(RideError::conflict("ride already has a lead"));
            }
            if state.current_count() >= state.ride.max_participants.max(0) as usize {
                return Err(RideError::conflict("ride is full"));
            }

            let participant = Participant::new(self.ride_id, identity_id, role, now);
            let mut drafts = vec![NewActivity::new(
                ActivityType::ParticipantJoined,
                format!("A {} joined the ride", role),
            )
            .actor(identity_id)
            .payload(payload::to_value(&MembershipPayload {
                participant_id: participant.id,
                identity_id,
                role,
            }))];
            if role == ParticipantRole::Lead {
                drafts.push(lead_changed_draft(actor, None, Some(participant.id)));
            }
            (participant, drafts)
        };

        let changes = ChangeSet {
            participants: vec![participant.clone()],
            ..ChangeSet::default()
        };
        self.commit(&gate, changes, drafts, now).await?;
        tracing::info!(
            ride_id = %self.ride_id,
            participant_id = %participant.id,
            role = %participant.role,
            "participant joined"
        );
        Ok(participant)
    }

    /// Marks a participant as left. Participants may remove themselves;
    /// removing someone else needs admin rights. A departing lead is demoted.
    pub async fn remove_participant(
        &self,
        actor: UserId,
        participant_id: ParticipantId,
    ) -> RideResult<Participant> {
        let identity_id = self.read_state().participant(participant_id)?.identity_id;
        if identity_id != actor {
            self.require_admin(actor, "remove participants").await?;
        }

        let gate = self.lock().await;
        let now = self.now();
        let (participant, drafts) = {
            let state = self.read_state();
            state.ensure_open("remove participant")?;
            let mut participant = state.participant(participant_id)?.clone();
            if !participant.is_current() {
                return Ok(participant);
            }

            let mut drafts = Vec::new();
            if participant.is_lead() {
                participant.role = ParticipantRole::Rider;
                drafts.push(lead_changed_draft(actor, Some(participant.id), None));
            }
            participant.left_at = Some(now);
            drafts.push(
                NewActivity::new(ActivityType::ParticipantLeft, "A participant left the ride")
                    .actor(participant.identity_id)
                    .payload(payload::to_value(&MembershipPayload {
                        participant_id: participant.id,
                        identity_id: participant.identity_id,
                        role: participant.role,
                    })),
            );
            (participant, drafts)
        };

        let changes = ChangeSet {
            participants: vec![participant.clone()],
            ..ChangeSet::default()
        };
        self.commit(&gate, changes, drafts, now).await?;
        tracing::info!(ride_id = %self.ride_id, %participant_id, "participant left");
        Ok(participant)
    }

    /// Changes the role of a current participant. Admin only.
    ///
    /// Promotion to lead goes through [`IntercomAuthority::set_lead`] so the
    /// previous lead is demoted in the same step. Moving the lead to any other
    /// role leaves the ride without a lead.
    pub async fn set_role(
        &self,
        actor: UserId,
        participant_id: ParticipantId,
        role: ParticipantRole,
    ) -> RideResult<Participant> {
        match role {
            ParticipantRole::Lead => return self.intercom().set_lead(actor, participant_id).await,
            ParticipantRole::Rider | ParticipantRole::Marshal | ParticipantRole::Sweep => {}
        }
        self.require_admin(actor, "change participant roles").await?;

        let gate = self.lock().await;
        let now = self.now();
        let (participant, drafts) = {
            let state = self.read_state();
            state.ensure_open("change participant role")?;
            let current = state.current_participant(participant_id)?;
            if current.role == role {
                return Ok(current.clone());
            }

            let mut drafts = Vec::with_capacity(2);
            if current.is_lead() {
                drafts.push(lead_changed_draft(actor, Some(current.id), None));
            }
            let mut participant = current.clone();
            participant.role = role;
            drafts.push(
                NewActivity::new(
                    ActivityType::RoleChanged,
                    format!("A participant is now a {}", role),
                )
                .actor(actor)
                .payload(payload::to_value(&MembershipPayload {
                    participant_id,
                    identity_id: participant.identity_id,
                    role,
                })),
            );
            (participant, drafts)
        };

        let changes = ChangeSet {
            participants: vec![participant.clone()],
            ..ChangeSet::default()
        };
        self.commit(&gate, changes, drafts, now).await?;
        tracing::info!(
            ride_id = %self.ride_id,
            %participant_id,
            role = %participant.role,
            "participant role changed"
        );
        Ok(participant)
    }

    /// Appends a checkpoint. Checkpoints are frozen once the ride starts.
    pub async fn add_checkpoint(&self, actor: UserId, new: NewCheckpoint) -> RideResult<Checkpoint> {
        self.require_admin(actor, "edit checkpoints").await?;

        let gate = self.lock().await;
        let now = self.now();
        let checkpoint = {
            let state = self.read_state();
            state.ensure_status("add checkpoint", RideStatus::Planned)?;
            build_checkpoint(
                self.ride_id,
                &new,
                state.checkpoints.len() as i32,
                &self.deps.settings,
                now,
            )?
        };

        let changes = ChangeSet {
            checkpoints: vec![checkpoint.clone()],
            ..ChangeSet::default()
        };
        self.commit(&gate, changes, Vec::new(), now).await?;
        tracing::info!(
            ride_id = %self.ride_id,
            checkpoint_id = %checkpoint.id,
            kind = %checkpoint.kind,
            "checkpoint added"
        );
        Ok(checkpoint)
    }

    pub fn is_active(&self) -> bool {
        self.read_state().ride.is_active()
    }

    pub fn ride(&self) -> Ride {
        self.read_state().ride.clone()
    }

    pub fn status(&self) -> RideStatus {
        self.read_state().ride.status
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.read_state().checkpoints.clone()
    }

    /// All participants, including those who left.
    pub fn participants(&self) -> Vec<Participant> {
        self.read_state().participants.clone()
    }

    pub fn participant(&self, participant_id: ParticipantId) -> RideResult<Participant> {
        self.read_state().participant(participant_id).cloned()
    }

    /// Resolves the caller's current participation. Callers who are not
    /// current participants get a permission error.
    pub fn current_participant_for(&self, identity_id: UserId) -> RideResult<Participant> {
        self.read_state()
            .current_for_identity(identity_id)
            .cloned()
            .ok_or_else(|| RideError::permission("caller is not a participant of this ride"))
    }

    pub fn current_lead(&self) -> Option<Participant> {
        self.read_state().current_lead().cloned()
    }

    /// Every attendance record, ordered by checkpoint then time.
    pub fn attendance(&self) -> Vec<AttendanceRecord> {
        let state = self.read_state();
        let mut records: Vec<_> = state.attendance.values().cloned().collect();
        state.sort_records(&mut records);
        records
    }

    pub fn attendance_for(&self, participant_id: ParticipantId) -> Vec<AttendanceRecord> {
        self.read_state().records_for(participant_id)
    }

    pub fn latest_location(&self, participant_id: ParticipantId) -> Option<LocationSample> {
        self.read_state()
            .tracks
            .get(&participant_id)
            .and_then(Track::latest)
            .cloned()
    }

    /// Bounded recent history, oldest first.
    pub fn location_history(&self, participant_id: ParticipantId) -> Vec<LocationSample> {
        self.read_state()
            .tracks
            .get(&participant_id)
            .map(|track| track.history().cloned().collect())
            .unwrap_or_default()
    }

    /// Meters covered by accepted samples since the session was loaded.
    pub fn distance_traveled(&self, participant_id: ParticipantId) -> f64 {
        self.read_state()
            .tracks
            .get(&participant_id)
            .map_or(0.0, Track::odometer_m)
    }

    /// Current participants and group admins may read the ride. Returns the
    /// caller's participation when there is one.
    pub async fn authorize_viewer(&self, identity_id: UserId) -> RideResult<Option<Participant>> {
        let current = self.read_state().current_for_identity(identity_id).cloned();
        if current.is_some() {
            return Ok(current);
        }
        if self.is_admin(identity_id).await? {
            return Ok(None);
        }
        Err(RideError::permission(
            "only participants and group admins can view this ride",
        ))
    }

    pub fn live_view(&self, viewer: Option<ParticipantId>) -> LiveRide {
        LiveRide::project(&self.read_state(), viewer, self.feed.last_sequence())
    }

    /// Resolves once the ride has completed.
    pub async fn closed(&self) {
        let mut head = self.feed.subscribe();
        while self.status() != RideStatus::Completed {
            if head.changed().await.is_err() {
                break;
            }
        }
    }

    /// Reads the feed by cursor, optionally waiting for new events.
    pub async fn activities(&self, query: &FeedQuery) -> Vec<ActivityEvent> {
        match query.wait_ms() {
            Some(wait_ms) if wait_ms > 0 => {
                self.feed
                    .wait_since(
                        query.since(),
                        query.limit(),
                        std::time::Duration::from_millis(wait_ms),
                    )
                    .await
            }
            _ => self.feed.read_since(query.since(), query.limit()),
        }
    }
}

pub(crate) fn lead_changed_draft(
    actor: UserId,
    previous_lead: Option<ParticipantId>,
    new_lead: Option<ParticipantId>,
) -> NewActivity {
    let message = if new_lead.is_some() {
        "Ride lead changed"
    } else {
        "Ride lead removed"
    };
    NewActivity::new(ActivityType::LeadChanged, message)
        .actor(actor)
        .payload(payload::to_value(&LeadChangedPayload {
            previous_lead,
            new_lead,
        }))
}

fn build_checkpoint(
    ride_id: RideId,
    new: &NewCheckpoint,
    position: i32,
    settings: &CoordinationSettings,
    now: DateTime<Utc>,
) -> RideResult<Checkpoint> {
    rules::validate_coordinates(new.latitude, new.longitude)?;
    let radius_m = new.radius_m.unwrap_or(settings.default_checkpoint_radius_m);
    rules::validate_radius(radius_m)?;
    Ok(Checkpoint {
        id: CheckpointId::new(),
        ride_id,
        kind: new.kind,
        latitude: new.latitude,
        longitude: new.longitude,
        radius_m,
        position,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::checkpoint::CheckpointKind;
    use crate::repositories::ride_store::MockRideStore;
    use crate::services::authorization::StaticAccessPolicy;
    use crate::utils::time::FixedClock;

    fn deps_with(store: Arc<dyn RideStore>, group: GroupId, admin: UserId) -> SessionDeps {
        SessionDeps {
            store,
            access: Arc::new(StaticAccessPolicy::new().with_admin(group, admin)),
            clock: Arc::new(FixedClock::new(Utc::now())),
            settings: CoordinationSettings::default(),
        }
    }

    fn new_ride(group: GroupId) -> NewRide {
        NewRide {
            group_id: group,
            name: "Dawn patrol".into(),
            max_participants: None,
            scheduled_end_at: None,
            checkpoints: vec![NewCheckpoint {
                kind: CheckpointKind::Meetup,
                latitude: 12.9716,
                longitude: 77.5946,
                radius_m: None,
            }],
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_and_feed_untouched() {
        let group = GroupId::new();
        let admin = UserId::new();
        let mut store = MockRideStore::new();
        // Creation succeeds, every later write fails.
        let mut calls = 0;
        store.expect_commit().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(anyhow::anyhow!("disk full"))
            }
        });

        let deps = deps_with(Arc::new(store), group, admin);
        let session = RideSession::create(deps, admin, new_ride(group)).await.unwrap();
        assert_eq!(session.checkpoints()[0].radius_m, 100.0);

        let err = session.activate(admin).await.unwrap_err();
        assert!(matches!(err, RideError::Storage(_)));
        assert_eq!(session.status(), RideStatus::Planned);
        assert_eq!(session.feed().last_sequence(), 0);
        assert!(session.feed().read_since(0, 10).is_empty());
    }

    #[tokio::test]
    async fn create_requires_group_admin() {
        let group = GroupId::new();
        let admin = UserId::new();
        let mut store = MockRideStore::new();
        store.expect_commit().never();

        let deps = deps_with(Arc::new(store), group, admin);
        let result = RideSession::create(deps, UserId::new(), new_ride(group)).await;
        assert!(matches!(result, Err(RideError::Permission(_))));
    }
}
