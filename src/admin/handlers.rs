use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::StaffUser, repo_types::User},
    error::{AppError, AppResult},
    pages::{display_time, render, AdminPage, AdminRow},
    profiles::{
        repo::list_users_with_profiles,
        repo_types::{Profile, DEFAULT_PICTURE},
        services::picture_url,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/", get(index))
        .route("/admin/users/:id/delete", post(delete_user))
}

#[instrument(skip_all, fields(staff_id = %staff.0.user.id))]
pub async fn index(State(state): State<AppState>, staff: StaffUser) -> AppResult<Html<String>> {
    let me = &staff.0.user;
    let mut rows = Vec::new();
    for u in list_users_with_profiles(&state.db).await? {
        let picture = u.picture.as_deref().unwrap_or(DEFAULT_PICTURE);
        rows.push(AdminRow {
            id: u.user_id.to_string(),
            picture_url: picture_url(&state, picture).await?,
            is_self: u.user_id == me.id,
            username: u.username,
            email: u.email,
            is_staff: u.is_staff,
            last_login: u.last_login.map(display_time).unwrap_or_else(|| "never".into()),
        });
    }
    Ok(render(&AdminPage {
        user: Some(me.username.clone()),
        rows,
    })?)
}

/// Deletes a user; the database cascades to profile and sessions.
#[instrument(skip_all, fields(staff_id = %staff.0.user.id, target_user = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    let me = &staff.0.user;
    if id == me.id {
        warn!("staff user tried to delete themselves");
        return Err(AppError::BadRequest("You cannot delete your own account here.".into()));
    }
    let profile = Profile::find_by_user(&state.db, id).await?;
    if !User::delete(&state.db, id).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    if let Some(profile) = profile.filter(|p| p.has_custom_picture()) {
        if let Err(e) = state.storage.delete_object(&profile.picture).await {
            warn!(error = %e, key = %profile.picture, "could not delete picture of removed user");
        }
    }
    info!(deleted_user = %id, "user deleted from admin");
    Ok(Redirect::to("/admin/"))
}
