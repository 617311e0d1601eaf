use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::data_formats::ListParams;
use crate::errors::StoreError;
use crate::models::{Article, ArticleHistory};

use super::{find_one_by_key, list_with_params, Columns};

const HISTORY_COLUMNS: &str =
    "id, uuid, article, version, status, article_id, action, created_at, updated_at, deleted_at";

const HISTORY_FIELDS: Columns = Columns {
    filterable: &[
        ("id", "id"),
        ("uuid", "uuid"),
        ("version", "version"),
        ("status", "status"),
        ("article_id", "article_id"),
        ("action", "action"),
    ],
    orderable: &[
        ("id", "id"),
        ("version", "version"),
        ("status", "status"),
        ("action", "action"),
        ("created_at", "created_at"),
    ],
};

/// Attempts made when another writer claims the same version first.
const MAX_VERSION_ATTEMPTS: usize = 3;

/// Appends a full snapshot of `article` as the next version of its history.
///
/// The write lock is taken before the last version is read, so writers on
/// other connections queue behind each other instead of reading a stale
/// version. A busy database or a `(article_id, version)` unique violation
/// is retried with a fresh read.
pub async fn record_history_in_db(
    pool: &SqlitePool,
    action: &str,
    article: &Article,
) -> Result<ArticleHistory, StoreError> {
    let snapshot = serde_json::to_string(article)?;
    let mut attempt = 1;
    loop {
        match append_history(pool, action, article, &snapshot).await {
            Err(e)
                if (e.is_unique_violation() || e.is_busy()) && attempt < MAX_VERSION_ATTEMPTS =>
            {
                tracing::warn!(
                    article_id = article.id,
                    attempt,
                    error = %e,
                    "History append conflicted, retrying"
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn append_history(
    pool: &SqlitePool,
    action: &str,
    article: &Article,
    snapshot: &str,
) -> Result<ArticleHistory, StoreError> {
    let mut conn = pool.acquire().await?;
    // `pool.begin()` issues a deferred BEGIN, which only takes the write
    // lock at the INSERT, after the version has already been read.
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    let result = match insert_next_version(&mut conn, action, article, snapshot).await {
        Ok(history) => sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map(|_| history)
            .map_err(StoreError::from),
        Err(e) => Err(e),
    };
    // The connection goes back to the pool, so it must not keep an open
    // transaction. A failed COMMIT may leave one behind as well.
    if result.is_err() {
        if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            tracing::warn!(error = %rollback, "History append rollback failed");
        }
    }
    result
}

async fn insert_next_version(
    conn: &mut SqliteConnection,
    action: &str,
    article: &Article,
    snapshot: &str,
) -> Result<ArticleHistory, StoreError> {
    let last_version = sqlx::query_scalar::<Sqlite, i64>(
        r#"
        SELECT version FROM article_histories
        WHERE article_id = $1
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(article.id)
    .fetch_optional(&mut *conn)
    .await?;
    let version = last_version.map_or(1, |version| version + 1);

    let history = sqlx::query_as::<Sqlite, ArticleHistory>(&format!(
        r#"
        INSERT INTO article_histories (uuid, article, version, status, article_id, action)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {HISTORY_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(snapshot)
    .bind(version)
    .bind(&article.status)
    .bind(article.id)
    .bind(action)
    .fetch_one(&mut *conn)
    .await?;
    Ok(history)
}

pub async fn list_histories_in_db(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<Vec<ArticleHistory>, StoreError> {
    list_with_params(
        pool,
        format!("SELECT {HISTORY_COLUMNS} FROM article_histories"),
        None,
        &HISTORY_FIELDS,
        params,
    )
    .await
}

pub async fn find_history_by_key_in_db(
    pool: &SqlitePool,
    key: &str,
    value: &str,
) -> Result<ArticleHistory, StoreError> {
    find_one_by_key(
        pool,
        format!("SELECT {HISTORY_COLUMNS} FROM article_histories"),
        &HISTORY_FIELDS,
        key,
        value,
    )
    .await
}
