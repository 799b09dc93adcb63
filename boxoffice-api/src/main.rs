use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use boxoffice_api::{
    app,
    render::QrPngRenderer,
    state::{artifact_service, AppState, AuthConfig},
    worker::start_artifact_worker,
};
use boxoffice_order::RetryPolicy;
use boxoffice_store::{Config, DbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice_api=debug,boxoffice_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Boxoffice API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let store = db.ticket_store(config.purchase.lock_timeout());
    let artifacts = artifact_service(store.clone(), Arc::new(QrPngRenderer::default()));
    let (dispatcher, _worker) = start_artifact_worker(artifacts.clone(), &config.artifacts);

    let purchase_retry = RetryPolicy::new(
        config.purchase.max_attempts,
        Duration::from_millis(config.purchase.retry_backoff_ms),
    );

    let app_state = AppState::new(
        store,
        artifacts,
        Arc::new(dispatcher),
        purchase_retry,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
