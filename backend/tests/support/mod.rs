#![allow(dead_code)]
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use live_ride_backend::{
    coordination::{CoordinationSettings, RideRegistry, RideSession, SessionDeps},
    models::{
        checkpoint::{CheckpointKind, NewCheckpoint},
        location::LocationFix,
        participant::{Participant, ParticipantRole},
        ride::NewRide,
    },
    repositories::InMemoryRideStore,
    services::StaticAccessPolicy,
    types::{GroupId, UserId},
    utils::{
        geo::{offset_north, GeoPoint},
        time::{Clock, FixedClock},
    },
};

/// Meetup point used across scenarios.
pub fn meetup_point() -> GeoPoint {
    GeoPoint::new(12.9716, 77.5946)
}

pub fn meetup_checkpoint() -> NewCheckpoint {
    let point = meetup_point();
    NewCheckpoint {
        kind: CheckpointKind::Meetup,
        latitude: point.latitude,
        longitude: point.longitude,
        radius_m: Some(100.0),
    }
}

/// A checkpoint `meters` north of the meetup point.
pub fn checkpoint_north(kind: CheckpointKind, meters: f64) -> NewCheckpoint {
    let point = offset_north(meetup_point(), meters);
    NewCheckpoint {
        kind,
        latitude: point.latitude,
        longitude: point.longitude,
        radius_m: Some(100.0),
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryRideStore>,
    pub access: Arc<StaticAccessPolicy>,
    pub clock: FixedClock,
    pub group: GroupId,
    pub admin: UserId,
    pub settings: CoordinationSettings,
}

impl Fixture {
    pub fn new() -> Self {
        let group = GroupId::new();
        let admin = UserId::new();
        Self {
            store: Arc::new(InMemoryRideStore::new()),
            access: Arc::new(StaticAccessPolicy::new().with_admin(group, admin)),
            clock: FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 6, 0, 0).unwrap()),
            group,
            admin,
            settings: CoordinationSettings::default(),
        }
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            store: self.store.clone(),
            access: self.access.clone(),
            clock: Arc::new(self.clock.clone()),
            settings: self.settings.clone(),
        }
    }

    pub fn registry(&self) -> RideRegistry {
        RideRegistry::new(self.deps())
    }

    pub fn new_ride(&self, checkpoints: Vec<NewCheckpoint>) -> NewRide {
        NewRide {
            group_id: self.group,
            name: "Nandi Hills sunrise".to_string(),
            max_participants: None,
            scheduled_end_at: None,
            checkpoints,
        }
    }

    pub async fn planned_ride(&self, checkpoints: Vec<NewCheckpoint>) -> Arc<RideSession> {
        RideSession::create(self.deps(), self.admin, self.new_ride(checkpoints))
            .await
            .expect("create ride")
    }

    pub async fn join(&self, session: &RideSession, role: ParticipantRole) -> Participant {
        let identity = UserId::new();
        let actor = if role == ParticipantRole::Rider {
            identity
        } else {
            self.admin
        };
        session
            .add_participant(actor, identity, role)
            .await
            .expect("join ride")
    }

    /// An active ride with one meetup checkpoint and `riders` riders.
    pub async fn active_ride(&self, riders: usize) -> (Arc<RideSession>, Vec<Participant>) {
        let session = self.planned_ride(vec![meetup_checkpoint()]).await;
        let mut participants = Vec::with_capacity(riders);
        for _ in 0..riders {
            participants.push(self.join(&session, ParticipantRole::Rider).await);
        }
        session.activate(self.admin).await.expect("activate ride");
        (session, participants)
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Advances the clock by a second and returns a fix at `point` stamped
    /// with the new time.
    pub fn fix_at(&self, point: GeoPoint) -> LocationFix {
        self.clock.advance(Duration::seconds(1));
        LocationFix {
            latitude: point.latitude,
            longitude: point.longitude,
            heading: Some(0.0),
            speed: Some(25.0),
            accuracy: Some(5.0),
            recorded_at: self.clock.now(),
        }
    }
}
