use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Profile, UserWithProfile, DEFAULT_PICTURE};

impl Profile {
    /// Create the profile that belongs to a freshly inserted user.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
    ) -> sqlx::Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, user_id, picture, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, picture, email
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(DEFAULT_PICTURE)
        .bind(email)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, user_id, picture, email FROM profiles WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    /// Profile of `user_id`, creating a blank one for users that predate
    /// profiles (e.g. inserted by hand).
    pub async fn get_or_create(db: &PgPool, user_id: Uuid, email: &str) -> sqlx::Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, user_id, picture, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, picture, email
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(DEFAULT_PICTURE)
        .bind(email)
        .fetch_one(db)
        .await
    }

    pub async fn update_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
        picture: &str,
    ) -> sqlx::Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET email = $2, picture = $3
            WHERE user_id = $1
            RETURNING id, user_id, picture, email
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(picture)
        .fetch_one(&mut **tx)
        .await
    }
}

pub async fn list_users_with_profiles(db: &PgPool) -> sqlx::Result<Vec<UserWithProfile>> {
    sqlx::query_as::<_, UserWithProfile>(
        r#"
        SELECT u.id AS user_id, u.username, u.email, u.is_staff, u.last_login, p.picture
        FROM users u
        LEFT JOIN profiles p ON p.user_id = u.id
        ORDER BY u.date_joined ASC
        "#,
    )
    .fetch_all(db)
    .await
}
