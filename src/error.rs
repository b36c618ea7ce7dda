use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::pages::{render, ErrorPage};

/// Errors a handler can return. Form validation failures are not errors;
/// they re-render the form.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No active session; carries the path to come back to after login.
    #[error("login required")]
    LoginRequired { next: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn login_required(next: impl Into<String>) -> Self {
        AppError::LoginRequired { next: next.into() }
    }
}

/// Query string sending the browser back to `next` after logging in.
pub fn login_url(next: &str) -> String {
    if next.is_empty() || next == "/" {
        "/login/".to_string()
    } else {
        format!("/login/?next={}", encode_query_value(next))
    }
}

fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::LoginRequired { next } => {
                return Redirect::to(&login_url(next)).into_response();
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Template(e) => {
                tracing::error!(error = %e, "template error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let page = ErrorPage {
            status: status.as_u16(),
            message,
            user: None,
        };
        match render(&page) {
            Ok(html) => (status, html).into_response(),
            Err(_) => (status, Html(page.message)).into_response(),
        }
    }
}
