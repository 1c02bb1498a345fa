use crate::admin::AdminCredentials;
use crate::config::Config;
use crate::ingestor::StatusIngestor;
use sortie_c2_router::{Broker, DispatchRouter, OutboxRelay, RedisStreamBroker};
use sortie_core::{KvStore, RedisStore};
use sortie_domain::MissionRegistry;
use sortie_identity::{BootstrapVerifier, TokenAuthority};
use std::sync::Arc;
use tracing::info;

/// Shared handles for handlers and background tasks.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KvStore>,
    pub broker: Arc<dyn Broker>,
    pub registry: MissionRegistry,
    pub authority: TokenAuthority,
    pub router: DispatchRouter,
    pub relay: OutboxRelay,
    pub admin: AdminCredentials,
}

impl AppState {
    /// Connect to Redis for both the store and the broker.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
        let broker: Arc<dyn Broker> = Arc::new(RedisStreamBroker::connect(&config.broker_url).await?);
        info!(redis = %config.redis_url, broker = %config.broker_url, "Connected to dependencies");

        // Argon2 blocks the calling thread
        let secret = config.bootstrap_secret.clone();
        let verifier = tokio::task::spawn_blocking(move || BootstrapVerifier::new(&secret)).await??;

        Ok(Self::from_parts(config, store, broker, verifier))
    }

    /// Assemble state over already-constructed backends.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn KvStore>,
        broker: Arc<dyn Broker>,
        verifier: BootstrapVerifier,
    ) -> Self {
        let registry = MissionRegistry::new(store.clone());
        let authority = TokenAuthority::new(store.clone(), verifier, config.token_ttl);
        let router = DispatchRouter::new(broker.clone());
        let relay = OutboxRelay::new(
            registry.clone(),
            router.clone(),
            config.outbox_sweep,
            config.outbox_grace,
        );
        let admin = AdminCredentials::new(config.admin_user.clone(), config.admin_pass.clone());

        AppState {
            config,
            store,
            broker,
            registry,
            authority,
            router,
            relay,
            admin,
        }
    }

    /// Status ingestor sharing this state's registry and authority.
    pub fn ingestor(&self, consumer: impl Into<String>) -> StatusIngestor {
        StatusIngestor::new(
            self.broker.clone(),
            self.registry.clone(),
            self.authority.clone(),
            consumer,
        )
    }
}
