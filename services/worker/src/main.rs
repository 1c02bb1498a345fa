use sortie_c2_router::RedisStreamBroker;
use sortie_core::logging;
use sortie_worker::{Config, HttpTokenIssuer, SimulatedExecutor, TokenManager, Worker};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_with(config.log_format);
    info!(?config, "Starting worker");

    let broker = Arc::new(RedisStreamBroker::connect(&config.broker_url).await?);
    let issuer = Arc::new(HttpTokenIssuer::new(&config.commander_url)?);

    // No orders are consumed before the first token arrives
    let tokens = Arc::new(
        TokenManager::bootstrap(
            issuer,
            config.worker_id.clone(),
            config.bootstrap_secret.clone(),
            config.refresh_margin,
            config.retry_delay,
        )
        .await,
    );
    let refresher = tokio::spawn(tokens.clone().run_refresher());

    let executor = Arc::new(SimulatedExecutor::new(config.profile));
    let worker = Worker::new(broker, tokens, executor, config.concurrency, config.retry_delay);
    let consumer = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!(worker_id = %config.worker_id, "Shutdown signal received");

    consumer.abort();
    refresher.abort();
    Ok(())
}
