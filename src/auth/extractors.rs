use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use tracing::warn;

use super::{
    cookie::read_session_token,
    jwt::{expires_at, JwtKeys},
    repo_types::{Role, User},
};
use crate::{error::AppError, state::AppState};

/// The authenticated user attached to the request by [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_expires_at: OffsetDateTime,
}

impl CurrentUser {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.user.role)
    }
}

/// Decodes the session cookie, loads the user and attaches it to the request.
pub async fn protect(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = read_session_token(req.headers()).ok_or(AppError::Unauthorized)?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(&token).map_err(|e| {
        warn!(error = %e, "invalid or expired session token");
        AppError::Unauthorized
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "session for unknown user");
            AppError::Unauthorized
        })?;

    req.extensions_mut().insert(CurrentUser {
        user,
        session_expires_at: expires_at(&claims),
    });
    Ok(next.run(req).await)
}

/// Rejects the request unless the current user's role is in `allowed`.
/// Must run after [`protect`].
pub async fn authorize(allowed: &'static [Role], req: Request, next: Next) -> Result<Response, AppError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;
    if !current.has_role(allowed) {
        warn!(user_id = %current.user.id, role = ?current.user.role, "role not allowed");
        return Err(AppError::Forbidden);
    }
    Ok(next.run(req).await)
}

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::User];

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
