use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    authentication::hash_password_argon2, data_formats::RegisterRequest, errors::StoreError,
    models::Auth,
};

const AUTH_COLUMNS: &str =
    "id, uuid, username, password, role_name, created_at, updated_at, deleted_at";

pub async fn insert_auth_in_db(
    pool: &SqlitePool,
    request: &RegisterRequest,
) -> Result<Auth, StoreError> {
    let hashed_password = hash_password_argon2(request.password.clone())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            StoreError::Password
        })?;

    let mut tx = pool.begin().await?;
    let auth = sqlx::query_as::<Sqlite, Auth>(&format!(
        r#"
        INSERT INTO auths (uuid, username, password, role_name)
        VALUES ($1, $2, $3, $4)
        RETURNING {AUTH_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(&request.username)
    .bind(hashed_password)
    .bind(request.role_name())
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(auth)
}

pub async fn find_auth_by_username_in_db(
    pool: &SqlitePool,
    username: &str,
) -> Result<Auth, StoreError> {
    sqlx::query_as::<Sqlite, Auth>(&format!(
        "SELECT {AUTH_COLUMNS} FROM auths WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn find_auth_by_id_in_db(pool: &SqlitePool, id: i64) -> Result<Auth, StoreError> {
    sqlx::query_as::<Sqlite, Auth>(&format!("SELECT {AUTH_COLUMNS} FROM auths WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}
