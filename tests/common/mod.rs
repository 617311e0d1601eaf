#![allow(dead_code)]

use std::time::Duration;

use cms::{
    config::JwtConfig, data_formats::Envelope, get_random_free_port, history::HistoryRecorder,
    make_router, models::ArticleHistory, run_migrations, AppState,
};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub const PASSWORD: &str = "correct horse battery staple";

/// Fresh in-memory database with the schema applied. A single connection
/// that never expires keeps the database alive for the whole test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret".to_string(),
        expiry_hours: 1,
    }
}

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Serves the real router on an ephemeral port.
pub async fn spawn_app() -> TestApp {
    let pool = test_pool().await;
    let (history, _worker) = HistoryRecorder::start(pool.clone(), 64);
    let state = AppState::new(pool.clone(), jwt_config(), history);

    let (listener, address) = get_random_free_port().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(make_router(state).into_make_service());
    tokio::spawn(server);

    TestApp {
        address: format!("http://{address}"),
        pool,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap()
    }

    /// Registers `username` and returns a bearer token for it.
    pub async fn token_for(&self, username: &str) -> String {
        assert_eq!(self.register(username).await.status(), 200);
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Envelope<Value> = response.json().await.unwrap();
        body.data.unwrap()["token"].as_str().unwrap().to_string()
    }

    pub async fn create_article(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/articles"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

/// Waits until the background worker has written `count` history entries
/// for the article.
pub async fn wait_for_histories(
    pool: &SqlitePool,
    article_id: i64,
    count: usize,
) -> Vec<ArticleHistory> {
    for _ in 0..200 {
        let histories = sqlx::query_as::<_, ArticleHistory>(
            "SELECT * FROM article_histories WHERE article_id = $1 ORDER BY version",
        )
        .bind(article_id)
        .fetch_all(pool)
        .await
        .unwrap();
        if histories.len() >= count {
            return histories;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("article {article_id} never reached {count} history entries");
}
