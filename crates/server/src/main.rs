use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use db::DBService;
use server::AppState;
use services::services::{
    config::Config,
    events::CaseEvents,
    pending_cases::{PendingCacheOptions, PendingCaseCache, SqlitePendingStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("invalid configuration")?;
    let db = DBService::new(&config.database_path)
        .await
        .context("failed to open database")?;

    let events = CaseEvents::new(config.event_buffer);
    let watcher = Arc::new(
        PendingCaseCache::new(
            Arc::new(SqlitePendingStore::new(db.pool.clone())),
            &events,
            PendingCacheOptions {
                stale_after: config.stale_after,
                fallback_poll: config.fallback_poll,
            },
        )
        .spawn(),
    );

    let state = AppState {
        db,
        events,
        watcher: watcher.clone(),
    };
    let app = server::app(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    watcher.close().await;
    Ok(())
}
