use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::sessions::store::SessionStore;

/// An authenticated request: the session resolved to a live identity.
pub struct CurrentUser {
    pub user_id: i64,
    pub token: Uuid,
}

/// Session state without a precondition: `None` means anonymous. Bad,
/// unknown and expired tokens all read as anonymous rather than rejecting.
pub struct MaybeUser(pub Option<i64>);

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<dyn SessionStore>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn SessionStore>::from_ref(state);
        let Some(token) = bearer_token(parts) else {
            return Err(ApiError::Unauthorized);
        };
        match store.resolve(token).await {
            Ok(Some(user_id)) => Ok(CurrentUser { user_id, token }),
            Ok(None) => {
                warn!("unknown or expired session token");
                Err(ApiError::Unauthorized)
            }
            Err(e) => Err(ApiError::Internal(e)),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Arc<dyn SessionStore>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn SessionStore>::from_ref(state);
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeUser(None));
        };
        match store.resolve(token).await {
            Ok(found) => Ok(MaybeUser(found)),
            Err(e) => {
                warn!(error = %e, "session lookup failed; treating request as anonymous");
                Ok(MaybeUser(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[test]
    fn bearer_token_parses_uuid() {
        let token = Uuid::new_v4();
        let parts = parts_with_auth(Some(&format!("Bearer {token}")));
        assert_eq!(bearer_token(&parts), Some(token));
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        assert_eq!(bearer_token(&parts_with_auth(None)), None);
    }

    #[test]
    fn bearer_token_rejects_wrong_scheme() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn bearer_token_rejects_non_uuid() {
        let parts = parts_with_auth(Some("Bearer not-a-token"));
        assert_eq!(bearer_token(&parts), None);
    }
}
