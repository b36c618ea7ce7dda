use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    forms::{EditErrors, EditProfileSubmission},
    repo_types::Profile,
    services::{picture_url, save_profile_edit, PLACEHOLDER_SVG, PLACEHOLDER_URL},
};
use crate::{
    auth::{extractors::CurrentUser, handlers::DASHBOARD_URL},
    error::AppResult,
    pages::{display_time, render, DashboardPage, EditProfilePage},
    state::AppState,
};

/// Room for the non-file fields and multipart framing on top of the picture.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn profile_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/dashboard/", get(dashboard))
        .route(
            "/edit/",
            get(edit_page)
                .post(edit)
                // Oversized pictures still reach the form and get a field error.
                .layer(DefaultBodyLimit::max(max_upload_bytes * 2 + FORM_OVERHEAD_BYTES)),
        )
        .route(PLACEHOLDER_URL, get(placeholder_picture))
}

async fn load_profile(state: &AppState, current: &CurrentUser) -> AppResult<Profile> {
    let user = &current.user;
    match Profile::find_by_user(&state.db, user.id).await? {
        Some(profile) => Ok(profile),
        None => {
            warn!(user_id = %user.id, "user had no profile; creating one");
            Ok(Profile::get_or_create(&state.db, user.id, &user.email).await?)
        }
    }
}

#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn dashboard(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    let profile = load_profile(&state, &current).await?;
    let user = current.user;
    Ok(render(&DashboardPage {
        user: Some(user.username.clone()),
        picture_url: picture_url(&state, &profile.picture).await?,
        username: user.username,
        email: profile.email,
        date_joined: display_time(user.date_joined),
    })?)
}

async fn edit_form(
    state: &AppState,
    current: &CurrentUser,
    profile: &Profile,
    email: String,
    errors: EditErrors,
) -> AppResult<Html<String>> {
    Ok(render(&EditProfilePage {
        user: Some(current.user.username.clone()),
        email,
        picture_url: picture_url(state, &profile.picture).await?,
        has_custom_picture: profile.has_custom_picture(),
        user_errors: errors.user,
        profile_errors: errors.profile,
    })?)
}

#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn edit_page(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    let profile = load_profile(&state, &current).await?;
    let email = current.user.email.clone();
    edit_form(&state, &current, &profile, email, EditErrors::default()).await
}

#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn edit(
    State(state): State<AppState>,
    current: CurrentUser,
    mp: Multipart,
) -> AppResult<Response> {
    let submission = EditProfileSubmission::from_multipart(mp).await?;
    let profile = load_profile(&state, &current).await?;

    let (email, change) = match submission.clean(state.config.storage.max_upload_bytes) {
        Ok(valid) => valid,
        Err(errors) => {
            warn!("profile edit rejected by validation");
            let page = edit_form(&state, &current, &profile, submission.email.trim().to_string(), errors).await?;
            return Ok(page.into_response());
        }
    };

    save_profile_edit(&state, &current.user, &profile, &email, change).await?;
    info!(username = %current.user.username, "profile edited");
    Ok(Redirect::to(DASHBOARD_URL).into_response())
}

pub async fn placeholder_picture() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        PLACEHOLDER_SVG,
    )
}
