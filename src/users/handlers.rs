use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::sessions::dto::SessionResponse;
use crate::sessions::{CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::users::dto::{
    ProfileResponse, PublicUser, RegisterRequest, RegistrationForm, UpdateProfileRequest,
};
use crate::users::model::User;
use crate::users::password::hash_password;
use crate::users::validate::{validate_profile, FieldError, ProfileFields};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/new", get(new))
        .route("/users/:id", get(show).put(update))
        .route("/users/:id/edit", get(edit))
}

// --- authorization checks, called at the top of each handler ---

/// Registration is only open to anonymous callers.
pub(crate) fn require_logged_out(session: &MaybeUser) -> Result<(), ApiError> {
    match session.0 {
        Some(_) => Err(ApiError::AlreadyAuthenticated),
        None => Ok(()),
    }
}

/// Editing a profile requires the session to own the targeted identity.
pub(crate) fn require_owner(current: &CurrentUser, target_id: i64) -> Result<(), ApiError> {
    if current.user_id == target_id {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn username_taken() -> ApiError {
    ApiError::Validation(vec![FieldError {
        field: "username",
        message: "has already been taken".into(),
    }])
}

/// A concurrent insert can slip past the pre-check and land on the unique
/// index; that still reads as a taken username, not an internal error.
fn map_unique_violation(e: anyhow::Error) -> ApiError {
    match e.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => username_taken(),
        _ => ApiError::Internal(e),
    }
}

// --- handlers ---

/// The registration form: the blank field set a caller may submit to
/// `POST /users`. Open to anonymous callers only, like registration itself.
#[instrument(skip(session))]
pub async fn new(session: MaybeUser) -> Result<Json<RegistrationForm>, ApiError> {
    require_logged_out(&session)?;
    Ok(Json(RegistrationForm::default()))
}

#[instrument(skip(state, session, payload))]
pub async fn register(
    State(state): State<AppState>,
    session: MaybeUser,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    require_logged_out(&session)?;
    payload.username = payload.username.trim().to_string();

    let errors = validate_profile(&ProfileFields {
        username: &payload.username,
        password: Some(&payload.password),
        phone: payload.phone.as_deref(),
    });
    if !errors.is_empty() {
        warn!(violations = errors.len(), "registration failed validation");
        return Err(ApiError::Validation(errors));
    }

    // Pre-check on top of the unique index so the common case reads as a
    // field error rather than a database error.
    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(username_taken());
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.username,
        &hash,
        payload.phone.as_deref(),
        payload.time_zone.as_deref(),
    )
    .await
    .map_err(map_unique_violation)?;

    let token = state.sessions.create(user.id).await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: ProfileResponse::from(&user),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, current))]
pub async fn edit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    require_owner(&current, id)?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ProfileResponse::from(&user)))
}

#[instrument(skip(state, current, payload))]
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    require_owner(&current, id)?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let candidate = merge_profile(&user, &payload);
    let errors = validate_profile(&ProfileFields {
        username: &candidate.username,
        password: candidate.password.as_deref(),
        phone: candidate.phone.as_deref(),
    });
    if !errors.is_empty() {
        warn!(user_id = id, violations = errors.len(), "update failed validation");
        return Err(ApiError::Validation(errors));
    }

    if candidate.username != user.username
        && User::find_by_username(&state.db, &candidate.username)
            .await?
            .is_some()
    {
        warn!(user_id = id, username = %candidate.username, "username already taken");
        return Err(username_taken());
    }

    // Hash only after the candidate passed validation; the stored row is
    // untouched until the single UPDATE below.
    let new_hash = match candidate.password.as_deref() {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };

    let user = User::update(
        &state.db,
        id,
        &candidate.username,
        new_hash.as_deref(),
        candidate.phone.as_deref(),
        candidate.time_zone.as_deref(),
    )
    .await
    .map_err(map_unique_violation)?;

    info!(user_id = user.id, "profile updated");
    Ok(Json(ProfileResponse::from(&user)))
}

// --- merge ---

/// The profile as it would be after applying a change set; only provided
/// fields differ from the stored record.
#[derive(Debug)]
pub(crate) struct ProfileCandidate {
    pub username: String,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub time_zone: Option<String>,
}

pub(crate) fn merge_profile(user: &User, changes: &UpdateProfileRequest) -> ProfileCandidate {
    ProfileCandidate {
        username: changes
            .username
            .as_deref()
            .map(str::trim)
            .unwrap_or(&user.username)
            .to_string(),
        password: changes.password.clone(),
        phone: changes.phone.clone().or_else(|| user.phone.clone()),
        time_zone: changes.time_zone.clone().or_else(|| user.time_zone.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::DatabaseError;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn stored_user() -> User {
        User {
            id: 1,
            username: "alice".into(),
            password_hash: "$argon2id$stub".into(),
            phone: Some("5558675309".into()),
            time_zone: Some("UTC".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn session_for(user_id: i64) -> CurrentUser {
        CurrentUser {
            user_id,
            token: Uuid::new_v4(),
        }
    }

    #[test]
    fn anonymous_caller_may_register() {
        assert!(require_logged_out(&MaybeUser(None)).is_ok());
    }

    #[tokio::test]
    async fn registration_form_lists_registerable_fields() {
        let Json(form) = new(MaybeUser(None)).await.expect("form");
        let json = serde_json::to_value(&form).expect("serialize");
        for field in ["username", "password", "phone", "time_zone"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn registration_form_denied_while_signed_in() {
        let err = new(MaybeUser(Some(1))).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyAuthenticated));
    }

    #[test]
    fn authenticated_caller_may_not_register() {
        let err = require_logged_out(&MaybeUser(Some(1))).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyAuthenticated));
    }

    #[test]
    fn owner_may_edit_own_profile() {
        assert!(require_owner(&session_for(1), 1).is_ok());
    }

    #[test]
    fn session_for_another_identity_is_denied() {
        let err = require_owner(&session_for(2), 1).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[derive(Debug)]
    struct DuplicateKeyError;

    impl std::fmt::Display for DuplicateKeyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message())
        }
    }

    impl std::error::Error for DuplicateKeyError {}

    impl sqlx::error::DatabaseError for DuplicateKeyError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_username_key\""
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23505".into())
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_reads_as_username_taken() {
        // the race the pre-check cannot close: concurrent insert hits the index
        let db_err = anyhow::Error::from(sqlx::Error::Database(Box::new(DuplicateKeyError)));
        match map_unique_violation(db_err) {
            ApiError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "username");
            }
            other => panic!("expected a username field error, got {other:?}"),
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = map_unique_violation(anyhow::anyhow!("connection reset"));
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let merged = merge_profile(&stored_user(), &UpdateProfileRequest::default());
        assert_eq!(merged.username, "alice");
        assert_eq!(merged.phone.as_deref(), Some("5558675309"));
        assert_eq!(merged.time_zone.as_deref(), Some("UTC"));
        assert!(merged.password.is_none());
    }

    #[test]
    fn merge_applies_only_provided_fields() {
        let merged = merge_profile(
            &stored_user(),
            &UpdateProfileRequest {
                phone: Some("5550001111".into()),
                ..Default::default()
            },
        );
        assert_eq!(merged.username, "alice");
        assert_eq!(merged.phone.as_deref(), Some("5550001111"));
        assert_eq!(merged.time_zone.as_deref(), Some("UTC"));
    }

    #[test]
    fn merge_trims_a_new_username() {
        let merged = merge_profile(
            &stored_user(),
            &UpdateProfileRequest {
                username: Some("  bob  ".into()),
                ..Default::default()
            },
        );
        assert_eq!(merged.username, "bob");
    }

    #[test]
    fn merged_candidate_revalidates_as_a_whole() {
        // a bad username change is caught even when only phone rules changed before
        let merged = merge_profile(
            &stored_user(),
            &UpdateProfileRequest {
                username: Some("x".into()),
                password: Some("ab".into()),
                ..Default::default()
            },
        );
        let errors = validate_profile(&ProfileFields {
            username: &merged.username,
            password: merged.password.as_deref(),
            phone: merged.phone.as_deref(),
        });
        let cited: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(cited.contains(&"username"));
        assert!(cited.contains(&"password"));
    }
}
