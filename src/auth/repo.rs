use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub token: Option<String>,
    pub token_expires_at: Option<OffsetDateTime>,
    pub confirmed: bool,
    pub created_at: OffsetDateTime,
}

/// The slice of a user attached to a request; the hash never leaves the store.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, token, token_expires_at, confirmed, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Token lookup honors the expiry window: a stale token behaves exactly
    /// like an unknown one.
    pub async fn find_by_token(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE token = $1 AND token_expires_at > now()"
        ))
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Identity resolution for the session middleware; excludes the hash.
    pub async fn find_session_user(db: &PgPool, id: Uuid) -> anyhow::Result<Option<SessionUser>> {
        let user = sqlx::query_as::<_, SessionUser>("SELECT id, name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        token: &str,
        token_expires_at: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, token, token_expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(token)
        .bind(token_expires_at)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Consume the confirmation token and mark the account confirmed.
    pub async fn confirm(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET token = NULL, token_expires_at = NULL, confirmed = TRUE
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Reissue the opaque token, e.g. when a password reset is requested.
    pub async fn set_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = $2, token_expires_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires_at)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Store a new hash and consume the reset token in the same statement.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, token = NULL, token_expires_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }
}
