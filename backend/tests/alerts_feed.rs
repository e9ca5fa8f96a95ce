use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use live_ride_backend::{
    coordination::FeedProjection,
    models::{
        activity::{ActivityEvent, ActivityType, FeedQuery},
        alert::{AlertKind, AlertRequest},
    },
    services::notification::{spawn_alert_dispatcher, NotificationSink},
    utils::geo::offset_north,
};

mod support;

use support::{meetup_point, Fixture};

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<ActivityEvent>>,
}

impl RecordingSink {
    fn sequences(&self) -> Vec<i64> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn alert_from_a_rider_lands_in_the_feed() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;

    let event = session
        .alerts()
        .raise(riders[0].id, AlertRequest::new(AlertKind::LowFuel))
        .await
        .unwrap();
    assert_eq!(event.activity_type, ActivityType::Alert);
    assert_eq!(event.message, AlertKind::LowFuel.default_message());
    assert_eq!(event.payload["alert_kind"], "low_fuel");
    assert_eq!(session.feed().read_since(0, 50).pop(), Some(event));

    let mut custom = AlertRequest::new(AlertKind::Sos);
    custom.message = Some("Crash near the toll gate".into());
    let here = offset_north(meetup_point(), 500.0);
    custom.latitude = Some(here.latitude);
    custom.longitude = Some(here.longitude);
    let event = session.alerts().raise(riders[0].id, custom).await.unwrap();
    assert_eq!(event.message, "Crash near the toll gate");
    assert_eq!(event.payload["latitude"], here.latitude);
}

#[tokio::test]
async fn alert_from_a_non_participant_is_rejected() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(2).await;
    let leaving = &riders[1];
    session
        .remove_participant(leaving.identity_id, leaving.id)
        .await
        .unwrap();
    let sequence = session.feed().last_sequence();

    let err = session
        .alerts()
        .raise(leaving.id, AlertRequest::new(AlertKind::Sos))
        .await
        .unwrap_err();
    assert!(err.is_permission());

    let stranger = live_ride_backend::types::ParticipantId::new();
    let err = session
        .alerts()
        .raise(stranger, AlertRequest::new(AlertKind::Sos))
        .await
        .unwrap_err();
    assert!(err.is_permission());
    assert_eq!(session.feed().last_sequence(), sequence);
}

#[tokio::test]
async fn alerts_need_an_active_ride() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    session.complete(fx.admin).await.unwrap();

    let err = session
        .alerts()
        .raise(riders[0].id, AlertRequest::new(AlertKind::Breakdown))
        .await
        .unwrap_err();
    assert!(err.is_state());
}

#[tokio::test]
async fn concurrent_writers_produce_a_gapless_feed() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(6).await;
    let start = session.feed().last_sequence();

    let mut tasks = Vec::new();
    for (i, rider) in riders.iter().cloned().enumerate() {
        let session = Arc::clone(&session);
        let kind = if i % 2 == 0 {
            AlertKind::NeedHelp
        } else {
            AlertKind::Breakdown
        };
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                session
                    .alerts()
                    .raise(rider.id, AlertRequest::new(kind))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let events = session.feed().read_since(0, 500);
    let sequences: Vec<i64> = events.iter().map(|e| e.sequence).collect();
    let expected: Vec<i64> = (1..=start + 30).collect();
    assert_eq!(sequences, expected);
    assert_eq!(fx.store.activity_count(session.ride_id()).await, events.len());
    assert!(FeedProjection::replay(&events).is_ok());
}

#[tokio::test]
async fn feed_reads_by_cursor_with_limit() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    for _ in 0..4 {
        session
            .alerts()
            .raise(riders[0].id, AlertRequest::new(AlertKind::NeedHelp))
            .await
            .unwrap();
    }
    let last = session.feed().last_sequence();

    let query = FeedQuery {
        since: last - 3,
        limit: 2,
        wait_ms: None,
    };
    let page = session.activities(&query).await;
    assert_eq!(
        page.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![last - 2, last - 1]
    );

    let tail = session
        .activities(&FeedQuery {
            since: last,
            ..FeedQuery::default()
        })
        .await;
    assert!(tail.is_empty());
}

#[tokio::test]
async fn long_poll_returns_once_an_event_arrives() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let cursor = session.feed().last_sequence();

    let reader = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .activities(&FeedQuery {
                    since: cursor,
                    limit: 10,
                    wait_ms: Some(5_000),
                })
                .await
        })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    session
        .alerts()
        .raise(riders[0].id, AlertRequest::new(AlertKind::Sos))
        .await
        .unwrap();

    let events = tokio::time::timeout(StdDuration::from_secs(2), reader)
        .await
        .expect("reader woke")
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sequence, cursor + 1);
}

#[tokio::test]
async fn dispatcher_delivers_only_alerts() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn_alert_dispatcher(Arc::clone(&session), sink.clone());

    session
        .locations()
        .submit(riders[0].id, fx.fix_at(meetup_point()))
        .await
        .unwrap();
    let alert = session
        .alerts()
        .raise(riders[0].id, AlertRequest::new(AlertKind::Sos))
        .await
        .unwrap();
    session.complete(fx.admin).await.unwrap();

    tokio::time::timeout(StdDuration::from_secs(2), handle)
        .await
        .expect("dispatcher finished after ride end")
        .unwrap();
    assert_eq!(sink.sequences(), vec![alert.sequence]);
}

#[tokio::test]
async fn dispatcher_sees_events_published_before_its_first_poll() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn_alert_dispatcher(Arc::clone(&session), sink.clone());

    // Nothing here yields to the spawned task before the ride ends.
    let mut expected = Vec::new();
    for kind in [AlertKind::LowFuel, AlertKind::NeedHelp] {
        let alert = session
            .alerts()
            .raise(riders[0].id, AlertRequest::new(kind))
            .await
            .unwrap();
        expected.push(alert.sequence);
    }
    session.complete(fx.admin).await.unwrap();

    tokio::time::timeout(StdDuration::from_secs(2), handle)
        .await
        .expect("dispatcher stopped at ride end")
        .unwrap();
    assert_eq!(sink.sequences(), expected);
}

#[tokio::test]
async fn registry_dispatches_alerts_of_tracked_rides() {
    let fx = Fixture::new();
    let sink = Arc::new(RecordingSink::default());
    let registry = fx.registry().with_notifications(sink.clone());
    let session = registry
        .create_ride(fx.admin, fx.new_ride(vec![support::meetup_checkpoint()]))
        .await
        .unwrap();
    let rider = fx
        .join(&session, live_ride_backend::models::participant::ParticipantRole::Rider)
        .await;
    session.activate(fx.admin).await.unwrap();

    session
        .alerts()
        .raise(rider.id, AlertRequest::new(AlertKind::Breakdown))
        .await
        .unwrap();

    let delivered = tokio::time::timeout(StdDuration::from_secs(2), async {
        loop {
            if !sink.sequences().is_empty() {
                break sink.sequences();
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await
    .expect("alert delivered");
    assert_eq!(delivered.len(), 1);
}
