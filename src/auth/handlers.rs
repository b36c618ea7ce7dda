use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};

use super::{
    extractors::MaybeUser,
    forms::{safe_next, LoginForm, NextQuery, RegisterForm, INACTIVE_LOGIN, INVALID_LOGIN, USERNAME_TAKEN},
    repo_types::User,
    services::{authenticate, create_user_with_profile, end_session, is_unique_violation, start_session, LoginOutcome},
    session::removal_cookie,
};
use crate::{
    error::AppResult,
    forms::FormErrors,
    pages::{render, LoggedOutPage, LoginPage, RegisterPage},
    state::AppState,
};

pub const DASHBOARD_URL: &str = "/dashboard/";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", get(register_page).post(register))
        .route("/login/", get(login_page).post(login))
        .route("/logout/", get(logout).post(logout))
}

#[instrument(skip_all)]
pub async fn register_page(current: MaybeUser) -> AppResult<Html<String>> {
    Ok(render(&RegisterPage {
        user: current.username(),
        username: String::new(),
        email: String::new(),
        errors: FormErrors::new(),
    })?)
}

fn register_form_again(current: &MaybeUser, form: &RegisterForm, errors: FormErrors) -> AppResult<Response> {
    Ok(render(&RegisterPage {
        user: current.username(),
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        errors,
    })?
    .into_response())
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    current: MaybeUser,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let (clean, mut errors) = match form.clean() {
        Ok(clean) => (Some(clean), FormErrors::new()),
        Err(errors) => (None, errors),
    };
    if !errors.has("username") && User::username_taken(&state.db, form.username.trim()).await? {
        errors.add("username", USERNAME_TAKEN);
    }
    let Some(clean) = clean.filter(|_| errors.is_empty()) else {
        warn!("registration rejected by validation");
        return register_form_again(&current, &form, errors);
    };

    let user = match create_user_with_profile(&state.db, &clean.username, &clean.email, &clean.password, false).await {
        Ok((user, _profile)) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!("username claimed concurrently");
            let mut errors = FormErrors::new();
            errors.add("username", USERNAME_TAKEN);
            return register_form_again(&current, &form, errors);
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    // The new account takes over this browser; any earlier session ends.
    if let Err(e) = end_session(&state, &jar).await {
        warn!(error = %e, "could not end previous session");
    }
    let cookie = start_session(&state, user.id).await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((jar.add(cookie), Redirect::to(DASHBOARD_URL)).into_response())
}

#[instrument(skip_all)]
pub async fn login_page(current: MaybeUser, Query(q): Query<NextQuery>) -> AppResult<Html<String>> {
    Ok(render(&LoginPage {
        user: current.username(),
        username: String::new(),
        next: safe_next(q.next.as_deref()).unwrap_or_default(),
        errors: FormErrors::new(),
    })?)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    current: MaybeUser,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(form.next.as_deref());
    let login_form_again = |errors: FormErrors| -> AppResult<Response> {
        Ok(render(&LoginPage {
            user: current.username(),
            username: form.username.trim().to_string(),
            next: next.clone().unwrap_or_default(),
            errors,
        })?
        .into_response())
    };

    let (username, password) = match form.clean() {
        Ok(v) => v,
        Err(errors) => return login_form_again(errors),
    };

    let user = match authenticate(&state.db, &username, &password).await? {
        LoginOutcome::Authenticated(user) => user,
        LoginOutcome::InvalidCredentials => {
            let mut errors = FormErrors::new();
            errors.add_non_field(INVALID_LOGIN);
            return login_form_again(errors);
        }
        LoginOutcome::Inactive => {
            let mut errors = FormErrors::new();
            errors.add_non_field(INACTIVE_LOGIN);
            return login_form_again(errors);
        }
    };

    // A previous session in this browser is replaced, not reused.
    if let Err(e) = end_session(&state, &jar).await {
        warn!(error = %e, "could not end previous session");
    }
    User::touch_last_login(&state.db, user.id).await?;
    let cookie = start_session(&state, user.id).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    let target = next.unwrap_or_else(|| DASHBOARD_URL.to_string());
    Ok((jar.add(cookie), Redirect::to(&target)).into_response())
}

/// Always succeeds: whatever session the browser had is gone afterwards.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    if let Err(e) = end_session(&state, &jar).await {
        error!(error = %e, "failed to delete session row; clearing cookie anyway");
    }
    let page = render(&LoggedOutPage { user: None })?;
    Ok((jar.add(removal_cookie()), page).into_response())
}
