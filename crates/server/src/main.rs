//! Plaza directory service binary.
//!
//! Serves the account lifecycle and post endpoints, and drives the recurring
//! maintenance jobs:
//!
//! - retention purge, daily at 00:00
//! - weekly broadcast, Fridays at 14:00
//! - engagement nudges, daily at 10:00 and 18:00
//!
//! The jobs fire on wall-clock time independent of request traffic; a failed
//! firing is logged and retried at the next trigger.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::sync::Arc;

use chrono::Weekday;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plaza_server::config::PlazaConfig;
use plaza_server::db;
use plaza_server::jobs::{
    EngagementNotifier, EngagementNudgeJob, RetentionJob, Schedule, Scheduler, WeeklyBroadcastJob,
};
use plaza_server::routes;
use plaza_server::services::outbox::InlineIcon;
use plaza_server::services::{CredentialService, FeedService, Outbox};
use plaza_server::state::AppState;
use plaza_server::store::postgres::{PgAccountStore, PgPostStore};
use plaza_server::store::{AccountStore, PostStore};

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = PlazaConfig::from_env().expect("Failed to load configuration");

    // Initialize tracing with EnvFilter
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "plaza_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p plaza-cli -- migrate

    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let posts: Arc<dyn PostStore> = Arc::new(PgPostStore::new(pool.clone()));

    // Start the outbound mail worker
    let outbox = Outbox::spawn(&config.mail).expect("Failed to start mail worker");

    let icon = load_icon(config.broadcast_icon.as_deref());

    let credentials = Arc::new(CredentialService::new(
        Arc::clone(&accounts),
        outbox.clone(),
        config.otp_ttl(),
    ));
    let feed = Arc::new(FeedService::new(Arc::clone(&posts), Arc::clone(&accounts)));

    // Wire the recurring jobs
    let notifier = Arc::new(EngagementNotifier::new(
        Arc::clone(&accounts),
        Arc::clone(&posts),
        outbox.clone(),
        config.engagement_threshold,
        config.engagement_renotify_after(),
        icon,
    ));

    let mut scheduler = Scheduler::new();
    scheduler.register(
        Schedule::daily(0, 0),
        Arc::new(RetentionJob::new(
            Arc::clone(&posts),
            config.retention_months,
        )),
    );
    scheduler.register(
        Schedule::weekly(Weekday::Fri, 14, 0),
        Arc::new(WeeklyBroadcastJob(Arc::clone(&notifier))),
    );
    scheduler.register(
        Schedule::at_hours(&[10, 18], 0),
        Arc::new(EngagementNudgeJob(notifier)),
    );
    scheduler.spawn();

    // Build router
    let state = AppState::new(credentials, feed, Some(pool));
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("plaza listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Read the inline notification icon, if configured and present.
fn load_icon(path: Option<&Path>) -> Option<InlineIcon> {
    let path = path?;
    match std::fs::read(path) {
        Ok(bytes) => Some(InlineIcon::new("icon", bytes)),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error,
                "broadcast icon unreadable; notification mail goes out without it");
            None
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
