use axum::{
    extract::Request,
    middleware::{self, Next},
    Router,
};

use crate::state::AppState;

mod claims;
pub mod cookie;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;

pub use dto::MessageResponse;
use extractors::{authorize, protect, ANY_ROLE};
use repo_types::Role;

/// Puts `router` behind the session check and the given role allow-list.
pub fn guarded(router: Router<AppState>, state: &AppState, roles: &'static [Role]) -> Router<AppState> {
    router
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            authorize(roles, req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(guarded(handlers::session_routes(), state, ANY_ROLE))
}
