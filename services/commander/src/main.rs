use sortie_commander::{router, AppState, Config};
use sortie_core::logging;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_with(config.log_format);
    info!(?config, "Starting commander");

    let state = Arc::new(AppState::new(config.clone()).await?);

    let ingestor = state.ingestor(config.consumer.clone());
    let ingest_task = tokio::spawn(ingestor.run());
    let relay_task = tokio::spawn(state.relay.clone().run());

    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Commander listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    ingest_task.abort();
    relay_task.abort();
    info!("Commander stopped");
    Ok(())
}
