pub mod authentication;
pub mod config;
pub mod data_formats;
pub mod db_helpers;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod models;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Json, Router};
use handlers::*;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
    time::Duration,
};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, JwtConfig};
use crate::history::HistoryRecorder;

pub type JsonResponse<T> = (StatusCode, Json<T>);

const HISTORY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handles injected into every handler through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub history: HistoryRecorder,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, history: HistoryRecorder) -> Self {
        AppState {
            pool,
            jwt: Arc::new(jwt),
            history,
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    let (history, worker) = HistoryRecorder::start(pool.clone(), config.history_queue_capacity);
    let app = make_router(AppState::new(pool, config.jwt.clone(), history));

    let address = config.socket_addr();
    tracing::info!(%address, "Server started");
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last recorder, so the worker exits once the queue drains.
    match tokio::time::timeout(HISTORY_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => tracing::info!("History queue drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "History worker panicked"),
        Err(_) => tracing::warn!("Timed out draining the history queue"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!(%db_url, "Creating database");
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {db_url}"))?;
    } else {
        tracing::debug!(%db_url, "Database already exists");
    }
    let pool = SqlitePoolOptions::new()
        .connect(db_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::debug!("Running migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    tracing::debug!("Migrations completed");
    Ok(())
}

pub fn get_random_free_port() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Could not bind a free port")?;
    let address = listener
        .local_addr()
        .context("Could not read the bound address")?;
    Ok((listener, address))
}

pub fn make_router(state: AppState) -> Router {
    Router::new()
        .route("/check_health", get(alive))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(get_profile))
        .route("/articles", post(create_article).get(list_articles))
        .route(
            "/articles/:uuid",
            get(get_article).patch(patch_article).delete(delete_article),
        )
        .route("/articles/:uuid/histories", get(list_article_histories))
        .route("/article-histories/:uuid", get(get_article_history))
        .route("/tags", post(create_tag).get(list_tags))
        .route("/tags/:id", get(get_tag))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// URL-safe slug: the title transliterated to ASCII, lower-cased, with
/// words joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return "article".to_string();
    }
    slug
}
