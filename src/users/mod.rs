mod dto;
mod export;
pub mod handlers;

use crate::auth::{
    extractors::{ADMIN_ONLY, ANY_ROLE},
    guarded,
};
use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guarded(handlers::admin_routes(), state, ADMIN_ONLY))
        .merge(guarded(handlers::member_routes(), state, ANY_ROLE))
}
