mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod services;

use crate::auth::{extractors::ADMIN_ONLY, guarded};
use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(guarded(handlers::write_routes(), state, ADMIN_ONLY))
}
