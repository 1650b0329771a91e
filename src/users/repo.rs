use crate::users::model::User;
use sqlx::PgPool;

impl User {
    /// Find a user by identity.
    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, phone, time_zone, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, phone, time_zone, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with an already-derived password hash.
    pub async fn create(
        db: &PgPool,
        username: &str,
        password_hash: &str,
        phone: Option<&str>,
        time_zone: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, phone, time_zone)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, phone, time_zone, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(phone)
        .bind(time_zone)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Persist a validated profile in one statement. A `None` hash keeps the
    /// stored credential.
    pub async fn update(
        db: &PgPool,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
        phone: Option<&str>,
        time_zone: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $2,
                password_hash = COALESCE($3, password_hash),
                phone = $4,
                time_zone = $5
            WHERE id = $1
            RETURNING id, username, password_hash, phone, time_zone, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .bind(phone)
        .bind(time_zone)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
