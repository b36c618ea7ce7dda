use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    password::{hash_password, verify_password},
    repo_types::{NewUser, Session, User},
    session::{SessionKeys, SESSION_COOKIE},
};
use crate::{profiles::repo_types::Profile, state::AppState};

/// Result of checking a username/password pair.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(User),
    InvalidCredentials,
    Inactive,
}

/// Inserts a user and its profile in one transaction, so no user is ever
/// left without a profile.
pub async fn create_user_with_profile(
    db: &PgPool,
    username: &str,
    email: &str,
    password: &str,
    staff: bool,
) -> anyhow::Result<(User, Profile)> {
    let password_hash = hash_password(password)?;
    let mut tx = db.begin().await?;
    let user = User::create_tx(
        &mut tx,
        &NewUser {
            username,
            email,
            password_hash: &password_hash,
            is_staff: staff,
            is_superuser: staff,
        },
    )
    .await?;
    let profile = Profile::create_tx(&mut tx, user.id, email).await?;
    tx.commit().await?;
    info!(user_id = %user.id, username = %user.username, "user created with profile");
    Ok((user, profile))
}

/// Postgres unique-violation, e.g. two registrations racing for a name.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505")
    )
}

pub async fn authenticate(db: &PgPool, username: &str, password: &str) -> anyhow::Result<LoginOutcome> {
    let Some(user) = User::find_by_username(db, username)
        .await
        .context("find_by_username")?
    else {
        // Hash anyway so unknown usernames take as long as wrong passwords.
        let _ = hash_password(password);
        warn!(username, "login unknown username");
        return Ok(LoginOutcome::InvalidCredentials);
    };

    let ok = match verify_password(password, &user.password_hash) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "stored password hash is unusable");
            false
        }
    };
    if !ok {
        warn!(username, user_id = %user.id, "login invalid password");
        return Ok(LoginOutcome::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login by inactive user");
        return Ok(LoginOutcome::Inactive);
    }
    Ok(LoginOutcome::Authenticated(user))
}

/// Opens a server-side session and returns the signed cookie pointing at it.
pub async fn start_session(state: &AppState, user_id: uuid::Uuid) -> anyhow::Result<Cookie<'static>> {
    let keys = SessionKeys::from_ref(state);
    let expires_at = keys.expires_at(OffsetDateTime::now_utc());
    let session = Session::create(&state.db, user_id, expires_at)
        .await
        .context("create session")?;
    let token = keys.sign(user_id, session.id, session.expires_at)?;
    Ok(keys.cookie(token))
}

/// Deletes the session the jar's cookie points at, if it is a valid one.
pub async fn end_session(state: &AppState, jar: &CookieJar) -> anyhow::Result<()> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(());
    };
    let keys = SessionKeys::from_ref(state);
    let Ok(claims) = keys.verify(cookie.value()) else {
        return Ok(());
    };
    Session::delete(&state.db, claims.sid)
        .await
        .context("delete session")?;
    info!(user_id = %claims.sub, session_id = %claims.sid, "session ended");
    Ok(())
}

/// Creates the configured superuser on startup unless it already exists.
pub async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(admin) = state.config.admin.as_ref() else {
        return Ok(());
    };
    if User::username_taken(&state.db, &admin.username).await? {
        return Ok(());
    }
    create_user_with_profile(&state.db, &admin.username, &admin.email, &admin.password, true)
        .await
        .context("create bootstrap superuser")?;
    info!(username = %admin.username, "superuser created");
    Ok(())
}
