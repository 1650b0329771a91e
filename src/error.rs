use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::users::password::CredentialError;
use crate::users::validate::FieldError;

/// Everything a handler can fail with. Converted to a response at the
/// controller boundary; validation and authorization failures never crash.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("already signed in")]
    AlreadyAuthenticated,
    #[error("not permitted")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("stored credential is unusable")]
    CredentialState(#[source] CredentialError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                let mut fields: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
                for e in errors {
                    fields.entry(e.field).or_default().push(e.message);
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": "validation_failed", "fields": fields })),
                )
                    .into_response()
            }
            ApiError::AlreadyAuthenticated => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "already_authenticated",
                    "message": "You are already signed in."
                })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "unauthorized",
                    "message": "You are not permitted to do that."
                })),
            )
                .into_response(),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "not_found", "message": "Not found." })),
            )
                .into_response(),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "invalid_credentials",
                    "message": "Invalid username or password."
                })),
            )
                .into_response(),
            // Internal causes are logged here and never echoed to the caller.
            ApiError::CredentialState(e) => {
                error!(error = %e, "credential state invalid");
                internal_response()
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                internal_response()
            }
        }
    }
}

fn internal_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal", "message": "Something went wrong." })),
    )
        .into_response()
}
