use std::collections::HashMap;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::Uri,
    Json,
};

use crate::{
    authentication::{issue_token, verify_password_argon2, VerifiedIdentity},
    data_formats::{
        ArticleDetailResponse, CreateArticleRequest, CreateTagRequest, Envelope, ListParams,
        LoginRequest, LoginResponse, PatchArticleRequest, ProfileResponse, RegisterRequest,
        TagDetailResponse, ValidatedJson,
    },
    db_helpers::{
        count_tag_usage_in_db, create_article_in_db, delete_article_by_key_in_db,
        find_article_by_key_in_db, find_article_tags_in_db, find_auth_by_id_in_db,
        find_auth_by_username_in_db, find_history_by_key_in_db, find_tag_by_id_in_db,
        insert_auth_in_db, insert_tag_in_db, list_articles_in_db, list_histories_in_db,
        list_tags_in_db, patch_article_in_db,
    },
    errors::{RequestError, StoreError},
    history::HistoryAction,
    models::{Article, ArticleHistory, Tag, TagListItem},
    AppState,
};

type JsonResult<T> = Result<Json<Envelope<T>>, RequestError>;
type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

const FAILED_TO_GET: &str = "Failed to get data";
const FAILED_TO_SAVE: &str = "Failed to save data";
const INVALID_CREDENTIALS: &str = "Invalid username or password";

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> RequestError {
    RequestError::NotFound(Some(format!("URL {uri} provided was not found")))
}

fn list_params(query: QueryParams) -> Result<ListParams, RequestError> {
    let Query(query) = query.map_err(|rejection| RequestError::BadRequest(rejection.body_text()))?;
    ListParams::from_query(query).map_err(RequestError::BadRequest)
}

/// Empty pages are reported as 404 with no data.
fn non_empty<T>(items: Vec<T>) -> JsonResult<Vec<T>> {
    if items.is_empty() {
        return Err(RequestError::NotFound(None));
    }
    Ok(Json(Envelope::ok(items)))
}

// ----------------- Auth Handlers -----------------
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> JsonResult<ProfileResponse> {
    let auth = insert_auth_in_db(&state.pool, &request)
        .await
        .map_err(RequestError::store(FAILED_TO_SAVE))?;
    tracing::info!(auth_id = auth.id, username = %auth.username, "Registered writer");
    Ok(Json(Envelope::ok(ProfileResponse::new(auth))))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> JsonResult<LoginResponse> {
    let auth = match find_auth_by_username_in_db(&state.pool, &request.username).await {
        Ok(auth) => auth,
        Err(StoreError::NotFound) => {
            return Err(RequestError::Unauthorized(INVALID_CREDENTIALS.to_string()))
        }
        Err(e) => return Err(RequestError::store(FAILED_TO_GET)(e)),
    };

    let is_password_correct = verify_password_argon2(request.password, &auth.password)
        .await
        .map_err(|e| RequestError::Internal(e.to_string()))?;
    if !is_password_correct {
        return Err(RequestError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token =
        issue_token(&auth, &state.jwt).map_err(|e| RequestError::Internal(e.to_string()))?;
    tracing::info!(auth_id = auth.id, "Issued token");
    Ok(Json(Envelope::ok(LoginResponse { token })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    identity: VerifiedIdentity,
) -> JsonResult<ProfileResponse> {
    let auth = find_auth_by_id_in_db(&state.pool, identity.id)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    Ok(Json(Envelope::ok(ProfileResponse::new(auth))))
}

// ----------------- Article Handlers -----------------
pub async fn create_article(
    State(state): State<AppState>,
    identity: VerifiedIdentity,
    ValidatedJson(request): ValidatedJson<CreateArticleRequest>,
) -> JsonResult<ArticleDetailResponse> {
    let article = create_article_in_db(&state.pool, identity.id, &request)
        .await
        .map_err(RequestError::store(FAILED_TO_SAVE))?;
    tracing::info!(article_id = article.id, writer_id = identity.id, "Created article");
    state.history.record(HistoryAction::Create, article.clone());

    let tags = find_article_tags_in_db(&state.pool, article.id)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    Ok(Json(Envelope::ok(ArticleDetailResponse::new(article, tags))))
}

pub async fn list_articles(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    query: QueryParams,
) -> JsonResult<Vec<Article>> {
    let params = list_params(query)?;
    let articles = list_articles_in_db(&state.pool, &params)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    non_empty(articles)
}

pub async fn get_article(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    Path(uuid): Path<String>,
) -> JsonResult<ArticleDetailResponse> {
    let article = find_article_by_key_in_db(&state.pool, "uuid", &uuid)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    let tags = find_article_tags_in_db(&state.pool, article.id)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    Ok(Json(Envelope::ok(ArticleDetailResponse::new(article, tags))))
}

pub async fn patch_article(
    State(state): State<AppState>,
    identity: VerifiedIdentity,
    Path(uuid): Path<String>,
    ValidatedJson(request): ValidatedJson<PatchArticleRequest>,
) -> JsonResult<Article> {
    let (field, value) = request
        .into_field()
        .ok_or_else(|| RequestError::BadRequest("exactly one field must be patched".to_string()))?;
    let article = find_article_by_key_in_db(&state.pool, "uuid", &uuid)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    let article = patch_article_in_db(&state.pool, article.id, &field, &value)
        .await
        .map_err(RequestError::store(FAILED_TO_SAVE))?;
    tracing::info!(article_id = article.id, writer_id = identity.id, %field, "Patched article");
    state.history.record(HistoryAction::Patch, article.clone());
    Ok(Json(Envelope::ok(article)))
}

pub async fn delete_article(
    State(state): State<AppState>,
    identity: VerifiedIdentity,
    Path(uuid): Path<String>,
) -> JsonResult<()> {
    let article = delete_article_by_key_in_db(&state.pool, "uuid", &uuid)
        .await
        .map_err(RequestError::store("Failed to delete article"))?;
    tracing::info!(article_id = article.id, writer_id = identity.id, "Deleted article");
    Ok(Json(Envelope::empty()))
}

// ----------------- History Handlers -----------------
pub async fn list_article_histories(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    Path(uuid): Path<String>,
    query: QueryParams,
) -> JsonResult<Vec<ArticleHistory>> {
    let params = list_params(query)?;
    let article = find_article_by_key_in_db(&state.pool, "uuid", &uuid)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    let histories = list_histories_in_db(&state.pool, &params.with_filter("article_id", article.id))
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    non_empty(histories)
}

pub async fn get_article_history(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    Path(uuid): Path<String>,
) -> JsonResult<ArticleHistory> {
    let history = find_history_by_key_in_db(&state.pool, "uuid", &uuid)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    Ok(Json(Envelope::ok(history)))
}

// ----------------- Tag Handlers -----------------
pub async fn create_tag(
    State(state): State<AppState>,
    identity: VerifiedIdentity,
    ValidatedJson(request): ValidatedJson<CreateTagRequest>,
) -> JsonResult<Tag> {
    let tag = insert_tag_in_db(&state.pool, &request.title)
        .await
        .map_err(RequestError::store(FAILED_TO_SAVE))?;
    tracing::info!(tag_id = tag.id, writer_id = identity.id, "Created tag");
    Ok(Json(Envelope::ok(tag)))
}

pub async fn list_tags(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    query: QueryParams,
) -> JsonResult<Vec<TagListItem>> {
    let params = list_params(query)?;
    let tags = list_tags_in_db(&state.pool, &params)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    non_empty(tags)
}

pub async fn get_tag(
    State(state): State<AppState>,
    _identity: VerifiedIdentity,
    Path(id): Path<String>,
) -> JsonResult<TagDetailResponse> {
    let id = id
        .parse::<i64>()
        .map_err(|_| RequestError::BadRequest(format!("tag id must be an integer, got `{id}`")))?;
    let tag = find_tag_by_id_in_db(&state.pool, id)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    let usage_count = count_tag_usage_in_db(&state.pool, tag.id)
        .await
        .map_err(RequestError::store(FAILED_TO_GET))?;
    Ok(Json(Envelope::ok(TagDetailResponse { tag, usage_count })))
}
