use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::dto::ProfileResponse;

/// Request body for signing in.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned after registration or login: the opaque session token plus the
/// owner's profile.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: Uuid,
    pub user: ProfileResponse,
}
