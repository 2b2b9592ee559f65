//! Kart league tournament server.
//!
//! Serves the HTTP API over a PostgreSQL database and runs a background
//! task that evicts stale cache entries, expired sessions and rate-limit
//! windows, and purges old soft-deleted rows when a retention is set.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use kart_league::{
    auth::CreateUserRequest,
    db::{Database, soft_delete::purge_all_before},
};
use kl_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{error, info, warn};

const HELP: &str = "\
Run the kart league tournament server

USAGE:
  kl_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url        URL         Database connection string  [default: env DATABASE_URL]
  --create-admin  USERNAME    Create an admin account and exit; password from KL_ADMIN_PASSWORD

FLAGS:
  -h, --help                  Print help information

ENVIRONMENT:
  SERVER_BIND                 Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL                PostgreSQL connection string
  JWT_SECRET                  JWT signing secret (at least 32 characters)
  PASSWORD_PEPPER             Password hashing pepper (at least 16 characters)
  METRICS_BIND                Prometheus exporter address, disabled when unset
  CACHE_TTL_SECS              Standings cache lifetime  [default: 300]
  PARTICIPANT_TOKEN_TTL_HOURS Default participant token lifetime  [default: 24]
  DELETED_RETENTION_DAYS      Purge soft-deleted rows after this many days  [default: keep]
  RUST_LOG                    Log filter  [default: info,sqlx=warn,hyper=warn]
";

/// How often the maintenance task runs
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    create_admin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        create_admin: pargs.opt_value_from_str("--create-admin")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)
        .context("Invalid server configuration")?;

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to apply migrations")?;
    info!("Database connected and migrated");

    let state = AppState::new(Arc::new(db.pool().clone()), &config);

    if let Some(username) = args.create_admin {
        return create_admin(&state, username).await;
    }

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind)
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {e}"))?;
        info!("Prometheus metrics exported on {}", metrics_bind);
    }

    tokio::spawn(maintenance(state.clone(), config.deleted_retention_days));

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

async fn create_admin(state: &AppState, username: String) -> Result<(), Error> {
    let password = std::env::var("KL_ADMIN_PASSWORD")
        .context("KL_ADMIN_PASSWORD must hold the new admin's password")?;

    let user = state
        .auth_manager
        .create_user(CreateUserRequest {
            display_name: username.clone(),
            username,
            password,
        })
        .await
        .context("Failed to create admin")?;

    info!("Created admin {} (ID: {})", user.username, user.id);
    Ok(())
}

/// Periodic cleanup of in-memory state, expired sessions and, with a
/// retention set, soft-deleted rows
async fn maintenance(state: AppState, retention_days: Option<i64>) {
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        interval.tick().await;

        let evicted = state.cache_store.evict_expired().await;
        let windows = state.rate_limiter.cleanup_expired().await;
        match state.auth_manager.purge_expired_sessions().await {
            Ok(sessions) if sessions > 0 => info!("Purged {} expired sessions", sessions),
            Ok(_) => {}
            Err(e) => warn!("Session purge failed: {}", e),
        }
        if let Some(days) = retention_days {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
            match purge_all_before(&state.pool, cutoff).await {
                Ok(rows) if rows > 0 => info!("Purged {} rows deleted before {}", rows, cutoff),
                Ok(_) => {}
                Err(e) => warn!("Soft delete purge failed: {}", e),
            }
        }

        if evicted > 0 || windows > 0 {
            info!(
                "Maintenance: {} cache entries evicted, {} rate limit windows dropped",
                evicted, windows
            );
        }
        metrics::cache_stats(state.cache.stats());
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
