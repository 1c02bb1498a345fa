//! Out-of-order, duplicate and unauthorized status events through the
//! ingestor.

use crate::test_utils::{Pipeline, BOOTSTRAP_SECRET};
use serde_json::json;
use sortie_c2_router::{StatusEvent, COMMANDER_GROUP, STATUS_STREAM};
use sortie_core::unix_now_secs;
use sortie_domain::{MissionStatus, NewMission};
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(1);

async fn queued_mission(p: &Pipeline) -> String {
    p.state
        .registry
        .create(NewMission {
            payload: json!({"objective": "bridge"}),
            target: None,
            commander_id: None,
        })
        .await
        .unwrap()
        .id
}

async fn token_for(p: &Pipeline, worker_id: &str) -> String {
    p.state
        .authority
        .issue(worker_id, BOOTSTRAP_SECRET)
        .await
        .unwrap()
        .token
}

fn event(mission_id: &str, status: MissionStatus, soldier_id: &str, token: &str, ts: i64) -> StatusEvent {
    StatusEvent {
        mission_id: mission_id.to_string(),
        status,
        soldier_id: soldier_id.to_string(),
        token: token.to_string(),
        detail: None,
        ts,
    }
}

#[tokio::test(start_paused = true)]
async fn test_terminal_before_in_progress() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = queued_mission(&p).await;
    let token = token_for(&p, "soldier-a").await;
    let t0 = unix_now_secs();

    p.publish_status(&event(&id, MissionStatus::Completed, "soldier-a", &token, t0 + 5))
        .await;
    p.publish_status(&event(&id, MissionStatus::InProgress, "soldier-a", &token, t0))
        .await;
    p.settle(SETTLE).await;

    let mission = p.state.registry.get(&id).await.unwrap();
    assert_eq!(mission.status, MissionStatus::Completed);
    assert_eq!(mission.in_progress_at, None);
    assert_eq!(mission.updated_at.timestamp(), t0 + 5);
    assert_eq!(p.broker.pending(STATUS_STREAM, COMMANDER_GROUP).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_and_conflicting_terminals() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = queued_mission(&p).await;
    let token = token_for(&p, "soldier-a").await;
    let t0 = unix_now_secs();

    for (status, ts) in [
        (MissionStatus::InProgress, t0 + 1),
        (MissionStatus::InProgress, t0 + 4),
        (MissionStatus::Failed, t0 + 6),
        (MissionStatus::Completed, t0 + 7),
        (MissionStatus::Queued, t0 + 8),
    ] {
        p.publish_status(&event(&id, status, "soldier-a", &token, ts))
            .await;
    }
    p.settle(SETTLE).await;

    let mission = p.state.registry.get(&id).await.unwrap();
    assert_eq!(mission.status, MissionStatus::Failed);
    assert_eq!(mission.in_progress_at.map(|t| t.timestamp()), Some(t0 + 1));
    assert_eq!(mission.updated_at.timestamp(), t0 + 6);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_events_leave_record_untouched() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = queued_mission(&p).await;
    let token_a = token_for(&p, "soldier-a").await;
    let _token_b = token_for(&p, "soldier-b").await;
    let t0 = unix_now_secs();

    // a's token presented as b, then an invented token
    p.publish_status(&event(&id, MissionStatus::Completed, "soldier-b", &token_a, t0))
        .await;
    p.publish_status(&event(&id, MissionStatus::Completed, "soldier-a", "forged", t0))
        .await;
    p.settle(SETTLE).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::Queued);

    p.publish_status(&event(&id, MissionStatus::InProgress, "soldier-a", &token_a, t0))
        .await;
    p.settle(SETTLE).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::InProgress);
    assert_eq!(p.broker.pending(STATUS_STREAM, COMMANDER_GROUP).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_mission_does_not_stall_the_stream() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = queued_mission(&p).await;
    let token = token_for(&p, "soldier-a").await;

    p.publish_status(&event("no-such-mission", MissionStatus::InProgress, "soldier-a", &token, 0))
        .await;
    p.publish_status(&event(&id, MissionStatus::InProgress, "soldier-a", &token, 0))
        .await;
    p.publish_status(&event(&id, MissionStatus::Completed, "soldier-a", &token, 0))
        .await;
    p.settle(SETTLE).await;

    assert_eq!(p.status_of(&id).await, MissionStatus::Completed);
    assert!(p
        .state
        .registry
        .get("no-such-mission")
        .await
        .is_err());
}
