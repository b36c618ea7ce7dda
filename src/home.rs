use axum::{response::Html, routing::get, Router};
use tracing::instrument;

use crate::{
    auth::extractors::MaybeUser,
    error::AppResult,
    pages::{render, HomePage},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(|| async { "ok" }))
}

#[instrument(skip_all)]
pub async fn home(current: MaybeUser) -> AppResult<Html<String>> {
    Ok(render(&HomePage {
        user: current.username(),
    })?)
}
