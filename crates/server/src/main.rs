use std::time::Duration;

use anyhow::Error as AnyhowError;
use auth::TokenService;
use db::{DBService, DbErr, events::OutboxEvent, models::event_outbox::EventOutbox};
use server::{AppState, http};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(500);
const OUTBOX_BATCH_SIZE: u64 = 64;
const OUTBOX_PRUNE_INTERVAL: Duration = Duration::from_secs(60);
const OUTBOX_RETENTION_HOURS: i64 = 1;
const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},db={level},db_migration={level},auth={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://taskboard.sqlite?mode=rwc".to_string());
    let jwt_secret = std::env::var("TASKBOARD_JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!(
            "TASKBOARD_JWT_SECRET not set; using an ephemeral secret, sessions will not survive a restart"
        );
        uuid::Uuid::new_v4().to_string()
    });

    let db = DBService::new(&database_url).await?;
    let tokens = TokenService::new(&jwt_secret, chrono::Duration::days(SESSION_TTL_DAYS));
    let state = AppState::new(db, tokens);

    spawn_outbox_publisher(state.clone());

    let app_router = http::router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(3001);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Drains the transactional outbox into the broadcast channel feeding the
/// WS event stream. With no subscribers connected the batch is left
/// untouched, so late subscribers still catch up without the table being
/// rewritten every poll. Delivered rows are pruned once they age out.
fn spawn_outbox_publisher(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_prune = tokio::time::Instant::now();
        loop {
            if state.events_tx().receiver_count() > 0 {
                match EventOutbox::fetch_unpublished(&state.db().pool, OUTBOX_BATCH_SIZE).await {
                    Ok(rows) => {
                        for row in rows {
                            let delivered =
                                state.events_tx().send(OutboxEvent::from(&row)).is_ok();
                            let marked = if delivered {
                                EventOutbox::mark_published(&state.db().pool, row.id).await
                            } else {
                                // The last subscriber left mid-batch.
                                EventOutbox::mark_failed(
                                    &state.db().pool,
                                    row.id,
                                    "no active subscribers",
                                )
                                .await
                            };
                            if let Err(err) = marked {
                                tracing::warn!("failed to update outbox row {}: {err}", row.id);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!("failed to fetch outbox batch: {err}");
                    }
                }
            }

            if last_prune.elapsed() >= OUTBOX_PRUNE_INTERVAL {
                last_prune = tokio::time::Instant::now();
                match EventOutbox::prune_published(
                    &state.db().pool,
                    chrono::Duration::hours(OUTBOX_RETENTION_HOURS),
                )
                .await
                {
                    Ok(pruned) if pruned > 0 => {
                        tracing::debug!("pruned {pruned} delivered outbox rows");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!("failed to prune outbox: {err}");
                    }
                }
            }
            tokio::time::sleep(OUTBOX_POLL_INTERVAL).await;
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
