use crate::auth::repo_types::{NewUser, Session, User};
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, is_staff, \
                            is_superuser, last_login, date_joined";

impl User {
    /// Find a user by username, ignoring case.
    pub async fn find_by_username(db: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn username_taken(db: &PgPool, username: &str) -> sqlx::Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE lower(username) = lower($1))"#,
        )
        .bind(username)
        .fetch_one(db)
        .await?;
        Ok(row.0)
    }

    /// Insert a user inside the caller's transaction.
    pub async fn create_tx(tx: &mut Transaction<'_, Postgres>, new: &NewUser<'_>) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn update_email_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        email: &str,
    ) -> sqlx::Result<()> {
        sqlx::query(r#"UPDATE users SET email = $2 WHERE id = $1"#)
            .bind(id)
            .bind(email)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(r#"UPDATE users SET last_login = now() WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Delete a user; profile and sessions go with it.
    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

impl Session {
    pub async fn create(db: &PgPool, user_id: Uuid, expires_at: OffsetDateTime) -> sqlx::Result<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(db)
        .await
    }

    /// The user behind a live session, or `None` when the session is gone,
    /// expired, or belongs to someone else.
    pub async fn active_user(db: &PgPool, session_id: Uuid, user_id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.is_active, u.is_staff,
                   u.is_superuser, u.last_login, u.date_joined
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1 AND s.user_id = $2 AND s.expires_at > now() AND u.is_active
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, session_id: Uuid) -> sqlx::Result<()> {
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(session_id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(db: &PgPool) -> sqlx::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM sessions WHERE expires_at <= now()"#)
            .execute(db)
            .await?;
        Ok(res.rows_affected())
    }
}
