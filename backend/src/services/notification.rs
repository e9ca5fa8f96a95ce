//! Alert delivery. A dispatcher per ride follows the activity feed by cursor
//! and hands alert events to a [`NotificationSink`]. The feed does not know
//! about its readers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordination::RideSession;
use crate::models::activity::{ActivityEvent, ActivityType};

const DISPATCH_BATCH: usize = 100;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &ActivityEvent) -> anyhow::Result<()>;
}

/// Writes alerts to the log. Stand-in for push/SMS delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        tracing::warn!(
            ride_id = %event.ride_id,
            sequence = event.sequence,
            actor_id = ?event.actor_id,
            message = %event.message,
            "alert notification"
        );
        Ok(())
    }
}

/// Starts following `session` from its current head. The cursor and head
/// subscription are captured before spawning. The task ends once the
/// ride-ended event has been seen.
pub fn spawn_alert_dispatcher(
    session: Arc<RideSession>,
    sink: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    let head = session.feed().subscribe();
    let cursor = session.feed().last_sequence();
    tokio::spawn(dispatch_alerts(session, sink, head, cursor))
}

async fn dispatch_alerts(
    session: Arc<RideSession>,
    sink: Arc<dyn NotificationSink>,
    mut head: watch::Receiver<i64>,
    mut cursor: i64,
) {
    let feed = session.feed();
    tracing::debug!(ride_id = %session.ride_id(), cursor, "alert dispatcher started");

    loop {
        let _ = head.borrow_and_update();
        let batch = feed.read_since(cursor, DISPATCH_BATCH);
        if batch.is_empty() {
            if head.changed().await.is_err() {
                break;
            }
            continue;
        }

        let mut ended = false;
        for event in batch {
            cursor = event.sequence;
            match event.activity_type {
                ActivityType::Alert => {
                    if let Err(err) = sink.deliver(&event).await {
                        tracing::warn!(
                            ride_id = %event.ride_id,
                            sequence = event.sequence,
                            error = %err,
                            "alert delivery failed"
                        );
                    }
                }
                ActivityType::RideEnded => ended = true,
                _ => {}
            }
        }
        if ended {
            break;
        }
    }
    tracing::debug!(ride_id = %session.ride_id(), cursor, "alert dispatcher stopped");
}
