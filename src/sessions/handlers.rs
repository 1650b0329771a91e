use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::error::ApiError;
use crate::sessions::dto::{LoginRequest, SessionResponse};
use crate::sessions::CurrentUser;
use crate::state::AppState;
use crate::users::dto::ProfileResponse;
use crate::users::model::User;
use crate::users::password::verify_password;

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/sessions", post(login).delete(logout))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    payload.username = payload.username.trim().to_string();

    let Some(user) = User::find_by_username(&state.db, &payload.username).await? else {
        warn!(username = %payload.username, "login unknown username");
        return Err(ApiError::InvalidCredentials);
    };

    // A hash that fails to parse is an invariant violation, not a mismatch:
    // the record's authentication path is broken until the credential is reset.
    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = user.id, "stored credential unusable");
        ApiError::CredentialState(e)
    })?;

    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.sessions.create(user.id).await?;
    info!(user_id = user.id, username = %user.username, "user signed in");
    Ok(Json(SessionResponse {
        token,
        user: ProfileResponse::from(&user),
    }))
}

#[instrument(skip(state, current))]
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.sessions.revoke(current.token).await?;
    info!(user_id = current.user_id, "user signed out");
    Ok(StatusCode::NO_CONTENT)
}
