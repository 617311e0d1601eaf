use std::collections::BTreeMap;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest},
    http::Request,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    errors::RequestError,
    models::{DEFAULT_ARTICLE_STATUS, DEFAULT_ROLE_NAME},
};

/// JSON body extractor that also runs `validator` checks. Both decode and
/// validation failures are rejected as 400 envelopes.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: Validate,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = RequestError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| RequestError::BadRequest(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| RequestError::BadRequest(errors.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

// ----------------- Auth Request -----------------
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl RegisterRequest {
    pub fn role_name(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => DEFAULT_ROLE_NAME,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

// ----------------- Article Request -----------------
#[derive(Deserialize, Serialize, Debug, Clone, Validate)]
pub struct CreateArticleRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateArticleRequest {
    pub fn status(&self) -> &str {
        match self.status.as_deref() {
            Some(status) if !status.is_empty() => status,
            _ => DEFAULT_ARTICLE_STATUS,
        }
    }
}

/// A patch names exactly one field and its new value, e.g. `{"status": "PUBLISHED"}`.
/// Whether the field is patchable is decided by the store.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct PatchArticleRequest {
    pub fields: BTreeMap<String, String>,
}

impl PatchArticleRequest {
    pub fn into_field(self) -> Option<(String, String)> {
        self.fields.into_iter().next()
    }
}

impl Validate for PatchArticleRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.fields.len() != 1 {
            let mut error = ValidationError::new("single_field");
            error.message = Some("exactly one field must be patched".into());
            errors.add("body", error);
        }
        if self.fields.values().any(|value| value.is_empty()) {
            let mut error = ValidationError::new("required");
            error.message = Some("patched value must not be empty".into());
            errors.add("value", error);
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ----------------- Tag Request -----------------
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
}
