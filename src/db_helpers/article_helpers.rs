use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use crate::data_formats::{CreateArticleRequest, ListParams};
use crate::errors::StoreError;
use crate::models::{Article, Tag};
use crate::slugify;

use super::tag_helpers::{canonical_tag_titles, link_tag, resolve_tag};
use super::{find_one_by_key, list_with_params, Columns};

const ARTICLE_COLUMNS: &str =
    "id, uuid, title, content, status, writer_id, slug, created_at, updated_at, deleted_at";

const ARTICLE_FIELDS: Columns = Columns {
    filterable: &[
        ("id", "id"),
        ("uuid", "uuid"),
        ("title", "title"),
        ("content", "content"),
        ("status", "status"),
        ("writer_id", "writer_id"),
        ("slug", "slug"),
    ],
    orderable: &[
        ("id", "id"),
        ("title", "title"),
        ("status", "status"),
        ("writer_id", "writer_id"),
        ("slug", "slug"),
        ("created_at", "created_at"),
        ("updated_at", "updated_at"),
    ],
};

/// Inserts the article and links every requested tag in one transaction.
/// Tags are resolved get-or-create; a failure anywhere rolls the whole
/// creation back, article row included.
pub async fn create_article_in_db(
    pool: &SqlitePool,
    writer_id: i64,
    request: &CreateArticleRequest,
) -> Result<Article, StoreError> {
    let mut tx = pool.begin().await?;

    let slug = slugify(&request.title);

    let article = sqlx::query_as::<Sqlite, Article>(&format!(
        r#"
        INSERT INTO articles (uuid, title, content, status, writer_id, slug)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {ARTICLE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(&request.title)
    .bind(&request.content)
    .bind(request.status())
    .bind(writer_id)
    .bind(&slug)
    .fetch_one(&mut tx)
    .await?;

    for title in canonical_tag_titles(&request.tags) {
        let tag_id = resolve_tag(&mut tx, &title).await?;
        link_tag(&mut tx, article.id, tag_id).await?;
    }

    tx.commit().await?;
    Ok(article)
}

pub async fn list_articles_in_db(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<Vec<Article>, StoreError> {
    list_with_params(
        pool,
        format!("SELECT {ARTICLE_COLUMNS} FROM articles"),
        None,
        &ARTICLE_FIELDS,
        params,
    )
    .await
}

pub async fn find_article_by_key_in_db(
    pool: &SqlitePool,
    key: &str,
    value: &str,
) -> Result<Article, StoreError> {
    find_one_by_key(
        pool,
        format!("SELECT {ARTICLE_COLUMNS} FROM articles"),
        &ARTICLE_FIELDS,
        key,
        value,
    )
    .await
}

pub async fn find_article_tags_in_db(
    pool: &SqlitePool,
    article_id: i64,
) -> Result<Vec<Tag>, StoreError> {
    let tags = sqlx::query_as::<Sqlite, Tag>(
        r#"
        SELECT tags.id, tags.uuid, tags.title, tags.created_at, tags.updated_at, tags.deleted_at
        FROM tags
        JOIN article_tags ON article_tags.tag_id = tags.id
        WHERE article_tags.article_id = $1
        ORDER BY tags.title
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

/// Deletes the article together with its tag links and history entries.
/// Either all three go or none of them do.
pub async fn delete_article_by_key_in_db(
    pool: &SqlitePool,
    key: &str,
    value: &str,
) -> Result<Article, StoreError> {
    let article = find_article_by_key_in_db(pool, key, value).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
        .bind(article.id)
        .execute(&mut tx)
        .await?;

    sqlx::query("DELETE FROM article_histories WHERE article_id = $1")
        .bind(article.id)
        .execute(&mut tx)
        .await?;

    sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(article.id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;
    Ok(article)
}

/// Updates a single field of an article. Only `status` can be patched; the
/// slug is never recomputed.
pub async fn patch_article_in_db(
    pool: &SqlitePool,
    id: i64,
    field: &str,
    value: &str,
) -> Result<Article, StoreError> {
    let mut article = find_article_by_key_in_db(pool, "id", &id.to_string()).await?;

    match field {
        "status" => article.status = value.to_owned(),
        other => {
            return Err(StoreError::InvalidParameter(format!(
                "field `{other}` cannot be patched"
            )))
        }
    }

    let article = sqlx::query_as::<Sqlite, Article>(&format!(
        r#"
        UPDATE articles
        SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        RETURNING {ARTICLE_COLUMNS}
        "#
    ))
    .bind(&article.status)
    .bind(article.id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)?;

    Ok(article)
}
