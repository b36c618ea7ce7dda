use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use super::{
    repo_types::{Session, User},
    session::{SessionKeys, SESSION_COOKIE},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// The logged-in user behind the request's session cookie.
///
/// Rejects with a redirect to the login page when there is no live session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
}

/// Like [`CurrentUser`] but anonymous visitors are allowed through.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// A logged-in user with staff rights; anyone else gets a 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub CurrentUser);

impl MaybeUser {
    pub fn username(&self) -> Option<String> {
        self.0.as_ref().map(|c| c.user.username.clone())
    }
}

async fn load_current_user(parts: &Parts, state: &AppState) -> AppResult<Option<CurrentUser>> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    if cookie.value().is_empty() {
        return Ok(None);
    }

    let keys = SessionKeys::from_ref(state);
    let claims = match keys.verify(cookie.value()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "invalid or expired session cookie");
            return Ok(None);
        }
    };

    let user = Session::active_user(&state.db, claims.sid, claims.sub).await?;
    Ok(user.map(|user| CurrentUser {
        user,
        session_id: claims.sid,
    }))
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match load_current_user(parts, state).await? {
            Some(current) => Ok(current),
            None => Err(AppError::login_required(requested_path(parts))),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(load_current_user(parts, state).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_staff {
            warn!(user_id = %current.user.id, "non-staff user tried the admin site");
            return Err(AppError::Forbidden(
                "You don't have permission to view this page.".into(),
            ));
        }
        Ok(StaffUser(current))
    }
}
