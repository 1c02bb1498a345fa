//! Submission to terminal status across commander, broker and workers.

use crate::test_utils::{quick_profile, Pipeline};
use axum::http::StatusCode;
use serde_json::json;
use sortie_c2_router::{direct_stream, OrderMessage, OutboxRelay, ORDERS_SHARED_STREAM};
use sortie_domain::MissionStatus;
use std::time::Duration;

const LIMIT: Duration = Duration::from_secs(120);

fn order_ids(bodies: &[String]) -> Vec<String> {
    bodies
        .iter()
        .map(|b| {
            serde_json::from_str::<OrderMessage>(b)
                .expect("order body")
                .mission_id
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_shared_and_direct_missions_reach_terminal() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    p.start_worker("soldier-a", 2, quick_profile(1.0), Duration::from_secs(3), 1)
        .await;
    p.start_worker("soldier-b", 2, quick_profile(1.0), Duration::from_secs(3), 2)
        .await;

    let mut shared = Vec::new();
    for i in 0..6 {
        shared.push(p.submit_ok(json!({"payload": {"seq": i}})).await);
    }
    let mut direct = Vec::new();
    for i in 0..2 {
        direct.push(
            p.submit_ok(json!({"payload": {"seq": i}, "target": "soldier-b"}))
                .await,
        );
    }

    for id in shared.iter().chain(direct.iter()) {
        let mission = p.wait_terminal(id, LIMIT).await;
        assert_eq!(mission.status, MissionStatus::Completed);
        assert!(mission.in_progress_at.is_some(), "{id} skipped IN_PROGRESS");
        assert!(mission.updated_at >= mission.created_at);
    }

    let shared_orders = order_ids(&p.broker.published(ORDERS_SHARED_STREAM).await);
    assert_eq!(shared_orders, shared);
    let direct_orders = order_ids(&p.broker.published(&direct_stream("soldier-b")).await);
    assert_eq!(direct_orders, direct);
    assert!(p.broker.published(&direct_stream("soldier-a")).await.is_empty());

    // every intent cleared once its order went out
    assert!(p.state.registry.pending_intents().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_missions_are_terminal_too() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    p.start_worker("soldier-a", 1, quick_profile(0.0), Duration::from_secs(3), 5)
        .await;

    let id = p.submit_ok(json!({"payload": "recon"})).await;
    let mission = p.wait_terminal(&id, LIMIT).await;
    assert_eq!(mission.status, MissionStatus::Failed);
    assert!(mission.in_progress_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_direct_order_waits_for_its_worker() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    p.start_worker("soldier-a", 4, quick_profile(1.0), Duration::from_secs(3), 3)
        .await;

    let id = p
        .submit_ok(json!({"payload": {}, "target": "soldier-late"}))
        .await;
    p.settle(Duration::from_secs(20)).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::Queued);

    p.start_worker("soldier-late", 1, quick_profile(1.0), Duration::from_secs(3), 4)
        .await;
    let mission = p.wait_terminal(&id, LIMIT).await;
    assert_eq!(mission.status, MissionStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_outbox_recovers_order_lost_to_broker_outage() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    p.start_worker("soldier-a", 1, quick_profile(1.0), Duration::from_secs(3), 6)
        .await;

    p.broker.set_offline(true);
    let (status, body) = p.submit(json!({"payload": {"grid": "38SMB"}})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let id = body["mission_id"].as_str().expect("mission_id").to_string();
    assert_eq!(p.status_of(&id).await, MissionStatus::Queued);
    assert_eq!(p.state.registry.pending_intents().await.unwrap().len(), 1);

    p.broker.set_offline(false);
    let relay = OutboxRelay::new(
        p.state.registry.clone(),
        p.state.router.clone(),
        Duration::from_secs(1),
        Duration::ZERO,
    );
    assert_eq!(relay.sweep().await.unwrap(), 1);

    let mission = p.wait_terminal(&id, LIMIT).await;
    assert_eq!(mission.status, MissionStatus::Completed);
    assert!(p.state.registry.pending_intents().await.unwrap().is_empty());
}
