//! Append-only, strictly ordered event log of one ride.
//!
//! Sequence numbers start at 1 and are gapless. They are assigned while the
//! session write gate is held, persisted together with the rest of the step,
//! and only then published to readers. Readers pull by cursor; a watch
//! channel carrying the last published sequence lets them wait for new
//! entries instead of polling.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{watch, MutexGuard};

use crate::models::activity::{ActivityEvent, NewActivity};
use crate::types::{ActivityId, RideId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("activity feed of ride {ride_id} is not gapless: expected sequence {expected}, found {found}")]
pub struct FeedGap {
    pub ride_id: RideId,
    pub expected: i64,
    pub found: i64,
}

#[derive(Debug)]
pub struct ActivityFeed {
    ride_id: RideId,
    events: RwLock<Vec<ActivityEvent>>,
    head: watch::Sender<i64>,
}

impl ActivityFeed {
    pub fn new(ride_id: RideId) -> Self {
        let (head, _) = watch::channel(0);
        Self {
            ride_id,
            events: RwLock::new(Vec::new()),
            head,
        }
    }

    /// Rebuilds a feed from stored events ordered by sequence.
    pub fn restore(ride_id: RideId, events: Vec<ActivityEvent>) -> Result<Self, FeedGap> {
        for (index, event) in events.iter().enumerate() {
            let expected = index as i64 + 1;
            if event.sequence != expected {
                return Err(FeedGap {
                    ride_id,
                    expected,
                    found: event.sequence,
                });
            }
        }
        let last = events.len() as i64;
        let (head, _) = watch::channel(last);
        Ok(Self {
            ride_id,
            events: RwLock::new(events),
            head,
        })
    }

    pub fn ride_id(&self) -> RideId {
        self.ride_id
    }

    /// Sequence of the most recently published event, 0 when empty.
    pub fn last_sequence(&self) -> i64 {
        *self.head.borrow()
    }

    /// Numbers `drafts` after the last published event. The result must be
    /// published before the gate is released, or dropped.
    pub(crate) fn stage(
        &self,
        _gate: &MutexGuard<'_, ()>,
        drafts: Vec<NewActivity>,
        now: DateTime<Utc>,
    ) -> Vec<ActivityEvent> {
        let next = self.read_events().len() as i64 + 1;
        drafts
            .into_iter()
            .enumerate()
            .map(|(offset, draft)| ActivityEvent {
                id: ActivityId::new(),
                ride_id: self.ride_id,
                sequence: next + offset as i64,
                activity_type: draft.activity_type,
                actor_id: draft.actor_id,
                checkpoint_id: draft.checkpoint_id,
                message: draft.message,
                payload: draft.payload,
                created_at: now,
            })
            .collect()
    }

    /// Makes persisted events visible to readers and wakes waiters.
    pub(crate) fn publish(&self, _gate: &MutexGuard<'_, ()>, events: Vec<ActivityEvent>) {
        let Some(last) = events.last().map(|event| event.sequence) else {
            return;
        };
        self.write_events().extend(events);
        self.head.send_replace(last);
        tracing::debug!(ride_id = %self.ride_id, sequence = last, "feed advanced");
    }

    /// Events with a sequence strictly greater than `cursor`, oldest first.
    pub fn read_since(&self, cursor: i64, limit: usize) -> Vec<ActivityEvent> {
        let events = self.read_events();
        let start = cursor.clamp(0, events.len() as i64) as usize;
        events[start..].iter().take(limit).cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.head.subscribe()
    }

    /// Like [`read_since`](Self::read_since), but waits up to `wait` for an
    /// event past `cursor` when none is available yet.
    pub async fn wait_since(&self, cursor: i64, limit: usize, wait: Duration) -> Vec<ActivityEvent> {
        let mut head = self.subscribe();
        let _ = tokio::time::timeout(wait, head.wait_for(|last| *last > cursor)).await;
        self.read_since(cursor, limit)
    }

    fn read_events(&self) -> RwLockReadGuard<'_, Vec<ActivityEvent>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_events(&self) -> RwLockWriteGuard<'_, Vec<ActivityEvent>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }
}
