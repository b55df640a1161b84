//! # PayFlow API Server
//!
//! The PayFlow API server onboards users onto Stripe Connect: it provisions
//! a connected account per user, issues onboarding links, and keeps the
//! local account ledger reconciled with the processor via status polls and
//! signed webhooks.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p payflow-api
//! ```

use payflow_api::{
    app::{build_router, AppState},
    config::Config,
};
use payflow_shared::db::{migrations, pool};
use payflow_shared::stripe::StripeClient;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "PayFlow API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let db = pool::create_pool(pool::PoolSettings {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    migrations::run_migrations(&db).await?;

    let stripe = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.api_base.clone(),
    )?);

    let bind_address = config.bind_address();
    let state = AppState::new(db, config, stripe);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
