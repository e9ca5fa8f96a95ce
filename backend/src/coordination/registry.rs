//! Live sessions by ride id.
//!
//! Sessions are created or loaded from storage on first use and kept in
//! memory while the ride is open. The map lock is held only for lookups,
//! inserts and evictions, never while a session does work, so rides stay
//! isolated from each other.
//!
//! Once a ride completes and its alert dispatcher has drained the feed, the
//! session is evicted. Completed rides accept no further writes, so a later
//! lookup simply loads a fresh read-only copy from storage without caching it.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::{RideError, RideResult};
use super::session::{RideSession, SessionDeps};
use crate::models::ride::{NewRide, RideStatus};
use crate::services::notification::{spawn_alert_dispatcher, NotificationSink};
use crate::types::{RideId, UserId};

type SessionMap = Arc<RwLock<HashMap<RideId, Arc<RideSession>>>>;

pub struct RideRegistry {
    deps: SessionDeps,
    sessions: SessionMap,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl RideRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            notifications: None,
        }
    }

    /// Alerts of every tracked ride are handed to `sink`.
    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn deps(&self) -> &SessionDeps {
        &self.deps
    }

    pub async fn create_ride(&self, actor: UserId, payload: NewRide) -> RideResult<Arc<RideSession>> {
        let session = RideSession::create(self.deps.clone(), actor, payload).await?;
        Ok(self.track(session).await)
    }

    /// Returns the live session, loading it from storage if needed.
    pub async fn get(&self, ride_id: RideId) -> RideResult<Arc<RideSession>> {
        if let Some(session) = self.sessions.read().await.get(&ride_id) {
            return Ok(session.clone());
        }

        let session = RideSession::load(self.deps.clone(), ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;
        Ok(self.track(session).await)
    }

    /// Whether the ride is currently held in memory.
    pub async fn is_tracked(&self, ride_id: RideId) -> bool {
        self.sessions.read().await.contains_key(&ride_id)
    }

    async fn track(&self, session: Arc<RideSession>) -> Arc<RideSession> {
        if session.status() == RideStatus::Completed {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.ride_id()) {
            // Another request loaded the same ride first.
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let dispatcher = self
                    .notifications
                    .as_ref()
                    .map(|sink| spawn_alert_dispatcher(session.clone(), sink.clone()));
                tokio::spawn(evict_when_closed(
                    Arc::clone(&self.sessions),
                    session.clone(),
                    dispatcher,
                ));
                entry.insert(session).clone()
            }
        }
    }
}

async fn evict_when_closed(
    sessions: SessionMap,
    session: Arc<RideSession>,
    dispatcher: Option<tokio::task::JoinHandle<()>>,
) {
    if let Some(dispatcher) = dispatcher {
        if let Err(err) = dispatcher.await {
            tracing::warn!(ride_id = %session.ride_id(), error = %err, "alert dispatcher aborted");
        }
    }
    session.closed().await;

    let ride_id = session.ride_id();
    let mut sessions = sessions.write().await;
    if let Entry::Occupied(entry) = sessions.entry(ride_id) {
        if Arc::ptr_eq(entry.get(), &session) {
            entry.remove();
            tracing::debug!(%ride_id, "completed ride evicted");
        }
    }
}
