//! Acopio ledger reconciliation server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use acopio_backend::{
    create_app,
    external::EntityApiClient,
    services::{CancelHandle, PgRunTracker, ReconciliationService, RunOutcome},
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "acopio_server=debug,acopio_backend=info,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    config.validate_settings()?;

    tracing::info!("Starting Acopio reconciliation server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Migrations completed");

    let store = Arc::new(EntityApiClient::new(&config.entity_api)?);
    let tracker = Arc::new(PgRunTracker::new(db_pool.clone()));
    let reconciliation = ReconciliationService::new(store, tracker, &config);

    if config.reconciliation.run_on_startup {
        let service = reconciliation.clone();
        tokio::spawn(async move {
            match service.run_once().await {
                Ok(RunOutcome::AlreadyRan { run_key }) => {
                    tracing::info!(%run_key, "Startup reconciliation not needed")
                }
                Ok(RunOutcome::Completed(summary)) => {
                    tracing::info!(run_id = %summary.run_id, "Startup reconciliation completed")
                }
                Err(err) => tracing::warn!(
                    error = %err,
                    retry_next_start = err.is_transient(),
                    "Startup reconciliation did not complete; run key left unmarked"
                ),
            }
        });
    }

    let cancel = reconciliation.cancel_handle();
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        reconciliation,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then stop launching new corrections
async fn shutdown_signal(cancel: CancelHandle) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown requested");
    cancel.cancel();
}
