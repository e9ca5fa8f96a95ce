use live_ride_backend::{
    coordination::{RideError, RideSession},
    models::{
        activity::ActivityType,
        checkpoint::CheckpointKind,
        participant::ParticipantRole,
        ride::RideStatus,
    },
    types::UserId,
};

mod support;

use support::{checkpoint_north, meetup_checkpoint, Fixture};

#[tokio::test]
async fn ride_moves_planned_active_completed() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;
    assert_eq!(session.status(), RideStatus::Planned);
    assert_eq!(session.feed().last_sequence(), 0);

    let ride = session.activate(fx.admin).await.expect("activate");
    assert_eq!(ride.status, RideStatus::Active);
    assert_eq!(ride.started_at, Some(fx.clock_now()));

    let ride = session.complete(fx.admin).await.expect("complete");
    assert_eq!(ride.status, RideStatus::Completed);
    assert!(ride.ended_at.is_some());

    let types: Vec<_> = session
        .feed()
        .read_since(0, 10)
        .into_iter()
        .map(|e| e.activity_type)
        .collect();
    assert_eq!(types, vec![ActivityType::RideStarted, ActivityType::RideEnded]);
}

#[tokio::test]
async fn transitions_outside_the_allowed_order_are_state_errors() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;

    let err = session.complete(fx.admin).await.unwrap_err();
    assert!(err.is_state(), "{err}");

    session.activate(fx.admin).await.unwrap();
    assert!(session.activate(fx.admin).await.unwrap_err().is_state());

    session.complete(fx.admin).await.unwrap();
    assert!(session.activate(fx.admin).await.unwrap_err().is_state());
    assert!(session.complete(fx.admin).await.unwrap_err().is_state());
    assert_eq!(session.feed().last_sequence(), 2);
}

#[tokio::test]
async fn activating_without_checkpoints_is_rejected() {
    let fx = Fixture::new();
    let session = fx.planned_ride(Vec::new()).await;

    let err = session.activate(fx.admin).await.unwrap_err();
    assert!(matches!(err, RideError::Precondition { .. }));
    assert_eq!(session.status(), RideStatus::Planned);
    assert_eq!(session.feed().last_sequence(), 0);
}

#[tokio::test]
async fn only_group_admins_change_status() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;
    let rider = fx.join(&session, ParticipantRole::Rider).await;

    let err = session.activate(rider.identity_id).await.unwrap_err();
    assert!(err.is_permission());
    assert_eq!(session.status(), RideStatus::Planned);
}

#[tokio::test]
async fn checkpoints_freeze_once_active() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;

    let stop = session
        .add_checkpoint(fx.admin, checkpoint_north(CheckpointKind::Stop, 5_000.0))
        .await
        .expect("add checkpoint");
    assert_eq!(stop.position, 1);
    assert_eq!(session.checkpoints().len(), 2);

    let mut bad = checkpoint_north(CheckpointKind::Stop, 9_000.0);
    bad.radius_m = Some(0.0);
    assert!(session.add_checkpoint(fx.admin, bad).await.unwrap_err().is_validation());

    session.activate(fx.admin).await.unwrap();
    let err = session
        .add_checkpoint(
            fx.admin,
            checkpoint_north(CheckpointKind::Destination, 20_000.0),
        )
        .await
        .unwrap_err();
    assert!(err.is_state());
    assert_eq!(session.checkpoints().len(), 2);
}

#[tokio::test]
async fn joining_is_idempotent_and_bounded() {
    let fx = Fixture::new();
    let mut payload = fx.new_ride(vec![meetup_checkpoint()]);
    payload.max_participants = Some(2);
    let session = RideSession::create(fx.deps(), fx.admin, payload)
        .await
        .unwrap();

    let first = fx.join(&session, ParticipantRole::Rider).await;
    let again = session
        .add_participant(first.identity_id, first.identity_id, ParticipantRole::Rider)
        .await
        .unwrap();
    assert_eq!(again.id, first.id);

    fx.join(&session, ParticipantRole::Rider).await;
    let late = UserId::new();
    let err = session
        .add_participant(late, late, ParticipantRole::Rider)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Only two join events, the repeat was absorbed.
    assert_eq!(session.feed().last_sequence(), 2);
}

#[tokio::test]
async fn joining_as_staff_requires_admin() {
    let fx = Fixture::new();
    let session = fx.planned_ride(vec![meetup_checkpoint()]).await;
    let someone = UserId::new();

    let err = session
        .add_participant(someone, someone, ParticipantRole::Marshal)
        .await
        .unwrap_err();
    assert!(err.is_permission());

    let marshal = session
        .add_participant(fx.admin, someone, ParticipantRole::Marshal)
        .await
        .unwrap();
    assert_eq!(marshal.role, ParticipantRole::Marshal);
}

#[tokio::test]
async fn completed_rides_reject_membership_changes() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(1).await;
    session.complete(fx.admin).await.unwrap();

    let newcomer = UserId::new();
    assert!(session
        .add_participant(newcomer, newcomer, ParticipantRole::Rider)
        .await
        .unwrap_err()
        .is_state());
    assert!(session
        .remove_participant(riders[0].identity_id, riders[0].id)
        .await
        .unwrap_err()
        .is_state());
}

#[tokio::test]
async fn leaving_keeps_history_but_ends_participation() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(2).await;
    let leaving = &riders[0];

    let left = session
        .remove_participant(leaving.identity_id, leaving.id)
        .await
        .unwrap();
    assert!(left.left_at.is_some());
    assert!(session.current_participant_for(leaving.identity_id).is_err());
    assert_eq!(session.participants().len(), 2);

    // Removing someone else needs admin rights.
    let other = &riders[1];
    assert!(session
        .remove_participant(leaving.identity_id, other.id)
        .await
        .unwrap_err()
        .is_permission());
    session.remove_participant(fx.admin, other.id).await.unwrap();
    assert!(session.live_view(None).riders.is_empty());
}

#[tokio::test]
async fn registry_reloads_rides_from_storage() {
    let fx = Fixture::new();
    let registry = fx.registry();
    let session = registry
        .create_ride(fx.admin, fx.new_ride(vec![meetup_checkpoint()]))
        .await
        .unwrap();
    let rider = fx.join(&session, ParticipantRole::Rider).await;
    session.activate(fx.admin).await.unwrap();

    // A fresh registry over the same store sees the committed state.
    let reloaded = fx.registry().get(session.ride_id()).await.unwrap();
    assert_eq!(reloaded.status(), RideStatus::Active);
    assert_eq!(reloaded.checkpoints(), session.checkpoints());
    assert_eq!(reloaded.participant(rider.id).unwrap(), rider);
    assert_eq!(reloaded.feed().read_since(0, 50), session.feed().read_since(0, 50));

    let missing = fx.registry().get(live_ride_backend::types::RideId::new()).await;
    assert!(matches!(missing, Err(err) if err.is_not_found()));
}

#[tokio::test]
async fn admins_reassign_roles_of_current_participants() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(2).await;
    let (first, second) = (&riders[0], &riders[1]);

    // Riders cannot promote themselves.
    assert!(session
        .set_role(first.identity_id, first.id, ParticipantRole::Marshal)
        .await
        .unwrap_err()
        .is_permission());

    let marshal = session
        .set_role(fx.admin, first.id, ParticipantRole::Marshal)
        .await
        .unwrap();
    assert_eq!(marshal.role, ParticipantRole::Marshal);
    let before = session.feed().last_sequence();
    session
        .set_role(fx.admin, first.id, ParticipantRole::Marshal)
        .await
        .unwrap();
    assert_eq!(session.feed().last_sequence(), before);

    // Promotion to lead hands the lead over in one step.
    session
        .set_role(fx.admin, first.id, ParticipantRole::Lead)
        .await
        .unwrap();
    session
        .set_role(fx.admin, second.id, ParticipantRole::Lead)
        .await
        .unwrap();
    assert_eq!(session.current_lead().unwrap().id, second.id);
    assert_eq!(session.participant(first.id).unwrap().role, ParticipantRole::Rider);

    // Moving the lead elsewhere leaves the ride without one.
    let swept = session
        .set_role(fx.admin, second.id, ParticipantRole::Sweep)
        .await
        .unwrap();
    assert_eq!(swept.role, ParticipantRole::Sweep);
    assert!(session.current_lead().is_none());
    let tail: Vec<_> = session
        .feed()
        .read_since(0, 100)
        .into_iter()
        .rev()
        .take(2)
        .map(|e| e.activity_type)
        .collect();
    assert_eq!(tail, vec![ActivityType::RoleChanged, ActivityType::LeadChanged]);

    let projection = live_ride_backend::coordination::FeedProjection::replay(
        &session.feed().read_since(0, 100),
    )
    .unwrap();
    assert_eq!(projection.lead, None);
    assert_eq!(projection.role_of(second.id), Some(ParticipantRole::Sweep));
    assert_eq!(projection.role_of(first.id), Some(ParticipantRole::Rider));
}

#[tokio::test]
async fn role_changes_need_an_open_ride_and_a_current_participant() {
    let fx = Fixture::new();
    let (session, riders) = fx.active_ride(2).await;
    session
        .remove_participant(riders[0].identity_id, riders[0].id)
        .await
        .unwrap();
    assert!(session
        .set_role(fx.admin, riders[0].id, ParticipantRole::Sweep)
        .await
        .unwrap_err()
        .is_permission());

    session.complete(fx.admin).await.unwrap();
    assert!(session
        .set_role(fx.admin, riders[1].id, ParticipantRole::Marshal)
        .await
        .unwrap_err()
        .is_state());
    assert!(session
        .set_role(fx.admin, riders[1].id, ParticipantRole::Lead)
        .await
        .unwrap_err()
        .is_state());
}

#[tokio::test]
async fn completed_rides_leave_the_registry_and_reload_from_storage() {
    let fx = Fixture::new();
    let registry = fx.registry();
    let session = registry
        .create_ride(fx.admin, fx.new_ride(vec![meetup_checkpoint()]))
        .await
        .unwrap();
    let ride_id = session.ride_id();
    fx.join(&session, ParticipantRole::Rider).await;
    session.activate(fx.admin).await.unwrap();
    assert!(registry.is_tracked(ride_id).await);

    session.complete(fx.admin).await.unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while registry.is_tracked(ride_id).await {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("completed ride evicted");

    let reloaded = registry.get(ride_id).await.unwrap();
    assert_eq!(reloaded.status(), RideStatus::Completed);
    assert_eq!(reloaded.feed().read_since(0, 50), session.feed().read_since(0, 50));
    assert!(!registry.is_tracked(ride_id).await);
}
