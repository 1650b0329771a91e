use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::model::User;

/// Request body for registration. This struct is the whitelist: fields not
/// listed here are dropped at the boundary.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Blank registerable field set, returned before registration the way
/// `ProfileResponse` is returned before an edit.
#[derive(Debug, Default, Serialize)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
    pub time_zone: Option<String>,
}

/// Request body for a profile edit. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub time_zone: Option<String>,
}

/// What anyone may see of a user.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

/// The owner's editable field set, returned from register/edit/update/login.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub phone: Option<String>,
    pub time_zone: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<&User> for ProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            phone: user.phone.clone(),
            time_zone: user.time_zone.clone(),
            created_at: user.created_at,
        }
    }
}
