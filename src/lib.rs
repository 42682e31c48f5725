pub mod authentication;
pub mod config;
pub mod data_formats;
mod db_helpers;
pub mod errors;
mod handlers;
pub mod models;
pub mod services;
pub mod state;
mod utils;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{middleware, routing::*, Extension, Json, Router};
pub use data_formats::*;
use handlers::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::{net::TcpListener, str::FromStr, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use state::AppState;

pub type JsonResponse<T> = (StatusCode, Json<T>);

pub async fn run_app(app: Router, listener: TcpListener) -> Result<()> {
    info!("listening on {}", listener.local_addr()?);
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

/// Handles on one SQLite database. Every write transaction goes through the
/// single `writer` connection, so a transaction that reads before it writes
/// never races another writer for the lock; `reader` serves everything else.
#[derive(Clone)]
pub struct Database {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

/// Opens the database, creating the file when missing, and applies the
/// embedded migrations.
pub async fn init_db(db_url: &str) -> Result<Database> {
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("invalid DATABASE_URL {db_url}"))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    // Each connection to `:memory:` is its own database.
    if db_url.contains(":memory:") {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to the database")?;
        run_migrations(&pool).await?;
        return Ok(Database {
            reader: pool.clone(),
            writer: pool,
        });
    }

    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await
        .context("Failed to connect to the database")?;
    run_migrations(&writer).await?;
    let reader = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("Failed to connect to the database")?;
    Ok(Database { reader, writer })
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("running migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    info!("migrations completed");
    Ok(())
}

pub fn make_router(app: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(alive))
        .route("/users/login", post(login_user))
        .route("/users", post(register_user))
        .route("/user", get(get_current_user).put(update_user))
        .route("/profiles/:username", get(get_profile))
        .route(
            "/profiles/:username/follow",
            post(follow_user).delete(unfollow_user),
        )
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/feed", get(feed_articles))
        .route(
            "/articles/:slug",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/:slug/favorite",
            post(favorite_article).delete(unfavorite_article),
        )
        .route(
            "/articles/:slug/comments",
            get(get_comments).post(add_comment),
        )
        .route("/articles/:slug/comments/:id", delete(delete_comment))
        .route("/tags", get(get_tags));

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(middleware::from_fn(log_unknown_errors))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(app))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
