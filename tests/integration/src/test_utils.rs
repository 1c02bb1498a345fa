//! Test utilities for end-to-end pipeline tests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use sortie_c2_router::{MemoryBroker, StatusEvent, STATUS_STREAM};
use sortie_commander::{router, AppState, Config};
use sortie_core::MemoryStore;
use sortie_domain::{Mission, MissionStatus};
use sortie_identity::{Argon2Cost, BootstrapVerifier, IdentityError, TokenAuthority};
use sortie_worker::{
    ExecutionProfile, IssuedCredential, SimulatedExecutor, TokenIssuer, TokenManager, Worker,
    WorkerError, WorkerResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use zeroize::Zeroizing;

/// Bootstrap secret every fixture is configured with
pub const BOOTSTRAP_SECRET: &str = "bootstrapsecret";

/// Poll interval while waiting on the pipeline
pub const POLL: Duration = Duration::from_millis(100);

/// Issues tokens straight from a [`TokenAuthority`], standing in for the
/// HTTP round trip a deployed worker makes.
pub struct AuthorityIssuer {
    authority: TokenAuthority,
}

impl AuthorityIssuer {
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl TokenIssuer for AuthorityIssuer {
    async fn issue(&self, worker_id: &str, secret: &str) -> WorkerResult<IssuedCredential> {
        match self.authority.issue(worker_id, secret).await {
            Ok(issued) => Ok(IssuedCredential {
                token: issued.token,
                ttl_secs: issued.ttl_secs,
            }),
            Err(IdentityError::InvalidSecret) => Err(WorkerError::Rejected(401)),
            Err(IdentityError::MissingField(_)) => Err(WorkerError::Rejected(400)),
            Err(_) => Err(WorkerError::Rejected(500)),
        }
    }
}

/// Short missions with a fixed outcome mix
pub fn quick_profile(success_rate: f64) -> ExecutionProfile {
    ExecutionProfile {
        min_units: 1,
        max_units: 3,
        unit: Duration::from_secs(1),
        success_rate,
    }
}

/// Commander state plus background tasks over in-memory backends.
pub struct Pipeline {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub broker: Arc<MemoryBroker>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(token_ttl: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(MemoryBroker::new());
        let verifier = BootstrapVerifier::with_cost(BOOTSTRAP_SECRET, Argon2Cost::light())
            .expect("light argon2 parameters are valid");
        let config = Config {
            token_ttl,
            ..Config::default()
        };
        let state = Arc::new(AppState::from_parts(
            config,
            store.clone(),
            broker.clone(),
            verifier,
        ));

        Self {
            state,
            store,
            broker,
            tasks: Vec::new(),
        }
    }

    /// Spawn the status ingestor.
    pub async fn start_ingestor(&mut self) {
        let ingestor = self
            .state
            .ingestor("commander-test")
            .with_timing(POLL, POLL);
        ingestor.ensure_group().await;
        self.tasks.push(tokio::spawn(ingestor.run()));
    }

    /// Token manager holding a first token from the commander's authority.
    /// No refresher is spawned.
    pub async fn token_manager(&self, worker_id: &str, refresh_margin: Duration) -> Arc<TokenManager> {
        let issuer = Arc::new(AuthorityIssuer::new(self.state.authority.clone()));
        Arc::new(
            TokenManager::bootstrap(
                issuer,
                worker_id,
                Zeroizing::new(BOOTSTRAP_SECRET.to_string()),
                refresh_margin,
                Duration::from_secs(1),
            )
            .await,
        )
    }

    /// Spawn a worker and its token refresher; returns once the worker holds
    /// its first token and its consumer groups exist.
    pub async fn start_worker(
        &mut self,
        worker_id: &str,
        concurrency: usize,
        profile: ExecutionProfile,
        refresh_margin: Duration,
        seed: u64,
    ) -> Arc<TokenManager> {
        let tokens = self.token_manager(worker_id, refresh_margin).await;
        self.tasks.push(tokio::spawn(tokens.clone().run_refresher()));

        let worker = Worker::new(
            self.broker.clone(),
            tokens.clone(),
            Arc::new(SimulatedExecutor::seeded(profile, seed)),
            concurrency,
            Duration::from_secs(1),
        )
        .with_block(POLL);
        worker.prepare().await;
        self.tasks.push(tokio::spawn(worker.run()));

        tokens
    }

    /// POST /missions through the HTTP router.
    pub async fn submit(&self, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/missions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        let resp = router(self.state.clone())
            .oneshot(req)
            .await
            .expect("router is infallible");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body readable");
        (status, serde_json::from_slice(&bytes).expect("JSON body"))
    }

    /// Submit and return the new mission id.
    pub async fn submit_ok(&self, body: Value) -> String {
        let (status, json) = self.submit(body).await;
        assert_eq!(status, StatusCode::OK, "submit failed: {json}");
        json["mission_id"]
            .as_str()
            .expect("mission_id in response")
            .to_string()
    }

    /// Publish a raw status event, as a worker would.
    pub async fn publish_status(&self, event: &StatusEvent) {
        use sortie_c2_router::Broker;
        let body = serde_json::to_string(event).expect("encodable event");
        self.broker
            .publish(STATUS_STREAM, &body)
            .await
            .expect("memory broker online");
    }

    /// Wait until `mission_id` reaches COMPLETED or FAILED.
    pub async fn wait_terminal(&self, mission_id: &str, limit: Duration) -> Mission {
        self.wait_for(mission_id, limit, |m| m.status.is_terminal())
            .await
    }

    /// Wait until `mission_id` satisfies `done`.
    pub async fn wait_for<F>(&self, mission_id: &str, limit: Duration, done: F) -> Mission
    where
        F: Fn(&Mission) -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let mission = self
                .state
                .registry
                .get(mission_id)
                .await
                .expect("mission exists");
            if done(&mission) {
                return mission;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "mission {mission_id} stuck in {}",
                mission.status
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Let background tasks run for `d`.
    pub async fn settle(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }

    /// Current status of a mission
    pub async fn status_of(&self, mission_id: &str) -> MissionStatus {
        self.state
            .registry
            .get(mission_id)
            .await
            .expect("mission exists")
            .status
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
