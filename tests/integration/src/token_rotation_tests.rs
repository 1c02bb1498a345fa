//! Credential rotation against in-flight missions.

use crate::test_utils::{Pipeline, BOOTSTRAP_SECRET};
use serde_json::json;
use sortie_c2_router::StatusEvent;
use sortie_domain::{MissionStatus, NewMission};
use sortie_worker::ExecutionProfile;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_missions_longer_than_token_ttl_complete() {
    let mut p = Pipeline::new(Duration::from_secs(6));
    p.start_ingestor().await;
    let tokens = p
        .start_worker(
            "soldier-a",
            2,
            ExecutionProfile {
                min_units: 15,
                max_units: 20,
                // keeps completions off the 4s refresh grid
                unit: Duration::from_millis(1050),
                success_rate: 1.0,
            },
            Duration::from_secs(2),
            9,
        )
        .await;
    let first = tokens.current().await.token().to_string();

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(p.submit_ok(json!({"payload": {"leg": i}})).await);
    }
    for id in &ids {
        let mission = p.wait_terminal(id, Duration::from_secs(120)).await;
        assert_eq!(mission.status, MissionStatus::Completed);
        assert!(mission.in_progress_at.is_some());
    }

    assert_ne!(tokens.current().await.token(), first);
    assert!(!p.state.authority.validate(&first, "soldier-a").await);
}

#[tokio::test(start_paused = true)]
async fn test_reissue_invalidates_previous_token() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = p
        .state
        .registry
        .create(NewMission {
            payload: json!("hold"),
            target: None,
            commander_id: None,
        })
        .await
        .unwrap()
        .id;

    let t1 = p.state.authority.issue("soldier-a", BOOTSTRAP_SECRET).await.unwrap();
    let t2 = p.state.authority.issue("soldier-a", BOOTSTRAP_SECRET).await.unwrap();
    assert!(!p.state.authority.validate(&t1.token, "soldier-a").await);
    assert!(p.state.authority.validate(&t2.token, "soldier-a").await);

    let signed = |token: &str, status| StatusEvent {
        mission_id: id.clone(),
        status,
        soldier_id: "soldier-a".into(),
        token: token.to_string(),
        detail: None,
        ts: 0,
    };

    p.publish_status(&signed(&t1.token, MissionStatus::InProgress)).await;
    p.settle(Duration::from_secs(1)).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::Queued);

    p.publish_status(&signed(&t2.token, MissionStatus::InProgress)).await;
    p.settle(Duration::from_secs(1)).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_is_rejected() {
    let mut p = Pipeline::new(Duration::from_secs(30));
    p.start_ingestor().await;
    let id = p
        .state
        .registry
        .create(NewMission {
            payload: json!({}),
            target: None,
            commander_id: None,
        })
        .await
        .unwrap()
        .id;

    let issued = p.state.authority.issue("soldier-a", BOOTSTRAP_SECRET).await.unwrap();
    p.settle(Duration::from_secs(31)).await;
    assert!(!p.state.authority.validate(&issued.token, "soldier-a").await);

    p.publish_status(&StatusEvent {
        mission_id: id.clone(),
        status: MissionStatus::Completed,
        soldier_id: "soldier-a".into(),
        token: issued.token.clone(),
        detail: None,
        ts: 0,
    })
    .await;
    p.settle(Duration::from_secs(1)).await;
    assert_eq!(p.status_of(&id).await, MissionStatus::Queued);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_bootstrap_secret_is_refused() {
    let p = Pipeline::new(Duration::from_secs(30));
    assert!(p.state.authority.issue("soldier-a", "guess").await.is_err());
    assert!(p
        .state
        .authority
        .list_credentials()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_terminal_reports_after_expiry_share_a_valid_token() {
    let p = Pipeline::new(Duration::from_secs(5));
    let tokens = p.token_manager("soldier-a", Duration::from_secs(1)).await;

    p.settle(Duration::from_secs(6)).await;
    assert!(tokens.current().await.is_expired());

    let (a, b) = tokio::join!(tokens.for_terminal(), tokens.for_terminal());
    assert_eq!(a.token(), b.token());
    assert!(p.state.authority.validate(a.token(), "soldier-a").await);
}
