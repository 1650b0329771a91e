use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database. A user owns posts and comments in the wider
/// application; those live elsewhere and only the ownership side exists here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    pub phone: Option<String>,
    pub time_zone: Option<String>,
    pub created_at: OffsetDateTime,
}
