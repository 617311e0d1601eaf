use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ARTICLE_STATUS: &str = "DRAFT";
pub const DEFAULT_ROLE_NAME: &str = "WRITER";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auth {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// An article row. This is also the shape serialized into history snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub content: String,
    pub status: String,
    pub writer_id: i64,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagListItem {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub usage_count: i64,
}

/// Immutable, versioned snapshot of an article taken after a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleHistory {
    pub id: i64,
    pub uuid: String,
    pub article: String,
    pub version: i64,
    pub status: String,
    pub article_id: i64,
    pub action: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl ArticleHistory {
    pub fn snapshot(&self) -> Result<Article, serde_json::Error> {
        serde_json::from_str(&self.article)
    }
}
