use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Maps opaque tokens to the identity they were issued for.
///
/// The production store is Postgres-backed; tests use the in-memory one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a fresh token for the identity.
    async fn create(&self, user_id: i64) -> anyhow::Result<Uuid>;
    /// Resolve a token to its identity. Unknown and expired tokens read as `None`.
    async fn resolve(&self, token: Uuid) -> anyhow::Result<Option<i64>>;
    /// Drop a session. Revoking an unknown token is a no-op.
    async fn revoke(&self, token: Uuid) -> anyhow::Result<()>;
}

pub struct PgSessionStore {
    db: PgPool,
    ttl: Duration,
}

impl PgSessionStore {
    pub fn new(db: PgPool, ttl_minutes: i64) -> Self {
        Self {
            db,
            ttl: Duration::minutes(ttl_minutes),
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: i64) -> anyhow::Result<Uuid> {
        let token = Uuid::new_v4();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(token)
    }

    async fn resolve(&self, token: Uuid) -> anyhow::Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM sessions
            WHERE token = $1 AND expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| r.0))
    }

    async fn revoke(&self, token: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM sessions WHERE token = $1"#)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// In-memory store used by `AppState::fake()` and unit tests.
pub struct MemorySessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<Uuid, (i64, OffsetDateTime)>>,
}

impl MemorySessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes),
            inner: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: i64) -> anyhow::Result<Uuid> {
        let token = Uuid::new_v4();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        self.inner
            .lock()
            .expect("session map lock")
            .insert(token, (user_id, expires_at));
        Ok(token)
    }

    async fn resolve(&self, token: Uuid) -> anyhow::Result<Option<i64>> {
        let map = self.inner.lock().expect("session map lock");
        Ok(map
            .get(&token)
            .filter(|(_, expires_at)| *expires_at > OffsetDateTime::now_utc())
            .map(|(user_id, _)| *user_id))
    }

    async fn revoke(&self, token: Uuid) -> anyhow::Result<()> {
        self.inner.lock().expect("session map lock").remove(&token);
        Ok(())
    }
}
