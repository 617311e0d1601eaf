use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Article, Auth, Tag};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProfileResponse {
    pub uuid: String,
    pub username: String,
    pub role_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ArticleDetailResponse {
    #[serde(flatten)]
    pub article: Article,
    pub tags: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct TagDetailResponse {
    pub tag: Tag,
    pub usage_count: i64,
}

impl ProfileResponse {
    pub fn new(
        Auth {
            uuid,
            username,
            role_name,
            created_at,
            updated_at,
            deleted_at,
            ..
        }: Auth,
    ) -> Self {
        ProfileResponse {
            uuid,
            username,
            role_name,
            created_at,
            updated_at,
            deleted_at,
        }
    }
}

impl ArticleDetailResponse {
    pub fn new(article: Article, tags: Vec<Tag>) -> Self {
        ArticleDetailResponse {
            article,
            tags: tags.into_iter().map(|tag| tag.title).collect(),
        }
    }
}
