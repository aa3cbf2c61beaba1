use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod public;

pub const AUTH_PREFIX: &str = "/auth";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(public::router())
        .nest(AUTH_PREFIX, auth::router(state))
}
