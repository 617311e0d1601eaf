use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::data_formats::ListParams;
use crate::errors::StoreError;
use crate::models::{Tag, TagListItem};

use super::{list_with_params, Columns};

const TAG_COLUMNS: &str = "id, uuid, title, created_at, updated_at, deleted_at";

const TAG_FIELDS: Columns = Columns {
    filterable: &[
        ("id", "tags.id"),
        ("uuid", "tags.uuid"),
        ("title", "tags.title"),
    ],
    orderable: &[
        ("id", "tags.id"),
        ("title", "tags.title"),
        ("created_at", "tags.created_at"),
        ("usage_count", "usage_count"),
    ],
};

/// Canonical tag title: trimmed and lower-cased.
pub fn canonical_tag_title(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Canonical titles for a create request, empty labels dropped and repeats
/// collapsed, in first-seen order.
pub fn canonical_tag_titles(labels: &[String]) -> Vec<String> {
    let mut titles: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let title = canonical_tag_title(label);
        if !title.is_empty() && !titles.contains(&title) {
            titles.push(title);
        }
    }
    titles
}

/// Get-or-create a tag by canonical title inside the caller's transaction.
/// The upsert is atomic, so concurrent writers with the same unseen title
/// both end up with the same row.
pub(crate) async fn resolve_tag(
    tx: &mut Transaction<'_, Sqlite>,
    title: &str,
) -> Result<i64, StoreError> {
    let tag_id = sqlx::query_scalar::<Sqlite, i64>(
        r#"
        INSERT INTO tags (uuid, title)
        VALUES ($1, $2)
        ON CONFLICT (title) DO UPDATE SET title = excluded.title
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(canonical_tag_title(title))
    .fetch_one(&mut *tx)
    .await?;
    Ok(tag_id)
}

pub(crate) async fn link_tag(
    tx: &mut Transaction<'_, Sqlite>,
    article_id: i64,
    tag_id: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO article_tags (article_id, tag_id)
        VALUES ($1, $2)
        ON CONFLICT (article_id, tag_id) DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(tag_id)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

/// Plain insert used by the tag endpoint; an existing title is a unique
/// constraint failure rather than a silent reuse.
pub async fn insert_tag_in_db(pool: &SqlitePool, title: &str) -> Result<Tag, StoreError> {
    let tag = sqlx::query_as::<Sqlite, Tag>(&format!(
        r#"
        INSERT INTO tags (uuid, title)
        VALUES ($1, $2)
        RETURNING {TAG_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(canonical_tag_title(title))
    .fetch_one(pool)
    .await?;
    Ok(tag)
}

pub async fn list_tags_in_db(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<Vec<TagListItem>, StoreError> {
    list_with_params(
        pool,
        r#"
        SELECT tags.id AS id, tags.uuid AS uuid, tags.title AS title,
               COUNT(article_tags.article_id) AS usage_count
        FROM tags
        LEFT JOIN article_tags ON article_tags.tag_id = tags.id"#
            .to_string(),
        Some(" GROUP BY tags.id, tags.uuid, tags.title"),
        &TAG_FIELDS,
        params,
    )
    .await
}

pub async fn find_tag_by_id_in_db(pool: &SqlitePool, id: i64) -> Result<Tag, StoreError> {
    sqlx::query_as::<Sqlite, Tag>(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

pub async fn count_tag_usage_in_db(pool: &SqlitePool, tag_id: i64) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<Sqlite, i64>(
        "SELECT COUNT(*) FROM article_tags WHERE tag_id = $1",
    )
    .bind(tag_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_titles_are_lower_cased_and_deduplicated() {
        let labels = vec![
            "News".to_string(),
            " news ".to_string(),
            "Rust".to_string(),
            "".to_string(),
            "   ".to_string(),
            "RUST".to_string(),
        ];
        assert_eq!(canonical_tag_titles(&labels), vec!["news", "rust"]);
    }
}
