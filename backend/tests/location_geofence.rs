use live_ride_backend::{
    coordination::LocationOutcome,
    models::{
        activity::ActivityType,
        attendance::{AttendanceSource, AttendanceStatus},
        checkpoint::CheckpointKind,
        participant::ParticipantRole,
    },
    utils::geo::{offset_north, GeoPoint},
};

mod support;

use support::{checkpoint_north, meetup_checkpoint, meetup_point, Fixture};

#[tokio::test]
async fn sample_inside_radius_records_one_arrival() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let rider = &riders[0];
    let before = session.feed().last_sequence();

    let near = offset_north(meetup_point(), 80.0);
    let outcome = session
        .locations()
        .submit(rider.id, fx.fix_at(near))
        .await
        .expect("submit");

    let arrivals = outcome.arrivals();
    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].status, AttendanceStatus::Present);
    assert_eq!(arrivals[0].source, AttendanceSource::Auto);
    assert_eq!(arrivals[0].reached_at, outcome.sample().recorded_at);

    let events = session.feed().read_since(before, 10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].activity_type, ActivityType::Arrival);
    assert_eq!(events[0].checkpoint_id, Some(arrivals[0].checkpoint_id));
    assert_eq!(events[0].actor_id, Some(rider.identity_id));
    assert_eq!(session.attendance_for(rider.id), arrivals.to_vec());
}

#[tokio::test]
async fn repeated_samples_inside_an_attained_checkpoint_add_nothing() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let rider = &riders[0];
    let near = offset_north(meetup_point(), 40.0);

    let fix = fx.fix_at(near);
    session.locations().submit(rider.id, fix.clone()).await.unwrap();
    let after_first = session.feed().last_sequence();
    let samples_after_first = fx.store.sample_count(session.ride_id()).await;

    // The identical sample is absorbed as a duplicate.
    for _ in 0..3 {
        let outcome = session.locations().submit(rider.id, fix.clone()).await.unwrap();
        assert!(outcome.is_duplicate());
    }
    assert_eq!(
        fx.store.sample_count(session.ride_id()).await,
        samples_after_first
    );

    // Newer samples still inside the radius are stored but attain nothing.
    for step in 0..3 {
        let point = offset_north(meetup_point(), 10.0 * step as f64);
        let outcome = session.locations().submit(rider.id, fx.fix_at(point)).await.unwrap();
        assert!(matches!(
            outcome,
            LocationOutcome::Accepted { ref arrivals, .. } if arrivals.is_empty()
        ));
    }

    assert_eq!(session.feed().last_sequence(), after_first);
    assert_eq!(session.attendance_for(rider.id).len(), 1);
    assert_eq!(
        session.latest_location(rider.id).unwrap().latitude,
        offset_north(meetup_point(), 20.0).latitude
    );
}

#[tokio::test]
async fn sample_outside_every_radius_only_moves_the_rider() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let far = offset_north(meetup_point(), 150.0);

    let outcome = session
        .locations()
        .submit(riders[0].id, fx.fix_at(far))
        .await
        .unwrap();
    assert!(outcome.arrivals().is_empty());
    assert!(session.attendance().is_empty());
    assert_eq!(session.latest_location(riders[0].id), Some(outcome.sample().clone()));
}

#[tokio::test]
async fn overlapping_checkpoints_are_all_attained() {
    let fx = Fixture::new();
    let session = fx
        .planned_ride(vec![
            meetup_checkpoint(),
            checkpoint_north(CheckpointKind::Stop, 120.0),
        ])
        .await;
    let rider = fx.join(&session, ParticipantRole::Rider).await;
    session.activate(fx.admin).await.unwrap();

    let between = offset_north(meetup_point(), 60.0);
    let outcome = session.locations().submit(rider.id, fx.fix_at(between)).await.unwrap();
    assert_eq!(outcome.arrivals().len(), 2);
    assert_eq!(session.attendance_for(rider.id).len(), 2);
}

#[tokio::test]
async fn submissions_outside_active_fail_without_side_effects() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;
    let rider = fx.join(&session, ParticipantRole::Rider).await;
    let near = offset_north(meetup_point(), 10.0);

    let sequence = session.feed().last_sequence();
    let err = session
        .locations()
        .submit(rider.id, fx.fix_at(near))
        .await
        .unwrap_err();
    assert!(err.is_state());
    assert_eq!(session.feed().last_sequence(), sequence);
    assert_eq!(fx.store.sample_count(session.ride_id()).await, 0);

    session.activate(fx.admin).await.unwrap();
    session.complete(fx.admin).await.unwrap();
    let sequence = session.feed().last_sequence();
    let err = session
        .locations()
        .submit(rider.id, fx.fix_at(near))
        .await
        .unwrap_err();
    assert!(err.is_state());
    assert_eq!(session.feed().last_sequence(), sequence);
    assert!(session.latest_location(rider.id).is_none());
    assert!(session.attendance().is_empty());
}

#[tokio::test]
async fn out_of_order_and_malformed_samples_are_rejected() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let rider = &riders[0];
    let far = offset_north(meetup_point(), 2_000.0);

    let first = fx.fix_at(far);
    session.locations().submit(rider.id, first.clone()).await.unwrap();

    let mut stale = fx.fix_at(offset_north(far, 10.0));
    stale.recorded_at = first.recorded_at;
    assert!(session
        .locations()
        .submit(rider.id, stale)
        .await
        .unwrap_err()
        .is_validation());

    let bad = fx.fix_at(GeoPoint::new(91.0, 77.0));
    assert!(session
        .locations()
        .submit(rider.id, bad)
        .await
        .unwrap_err()
        .is_validation());
    assert_eq!(fx.store.sample_count(session.ride_id()).await, 1);
}

#[tokio::test]
async fn only_current_participants_submit_locations() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    let rider = &riders[0];
    session.remove_participant(rider.identity_id, rider.id).await.unwrap();

    let err = session
        .locations()
        .submit(rider.id, fx.fix_at(meetup_point()))
        .await
        .unwrap_err();
    assert!(err.is_permission());
}

#[tokio::test]
async fn arrival_records_distance_traveled_since_previous_arrival() {
    let fx = Fixture::new();
    let session = fx
        .planned_ride(vec![
            meetup_checkpoint(),
            checkpoint_north(CheckpointKind::Destination, 1_000.0),
        ])
        .await;
    let rider = fx.join(&session, ParticipantRole::Rider).await;
    session.activate(fx.admin).await.unwrap();

    for meters in [0.0, 300.0, 600.0, 950.0] {
        let point = offset_north(meetup_point(), meters);
        session.locations().submit(rider.id, fx.fix_at(point)).await.unwrap();
    }

    let records = session.attendance_for(rider.id);
    assert_eq!(records.len(), 2);
    let destination = records
        .iter()
        .find(|r| r.distance_traveled_m.map_or(false, |d| d > 0.0))
        .expect("destination arrival");
    let traveled = destination.distance_traveled_m.unwrap();
    assert!((traveled - 950.0).abs() < 2.0, "traveled {traveled}");
    assert!((session.distance_traveled(rider.id) - 950.0).abs() < 2.0);
}
