use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        cookie::{clear_session_cookie, session_cookie},
        dto::{LoginRequest, MessageResponse, SessionResponse, SignupRequest, VerifyEmailQuery},
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{
            generate_verification_token, hash_password, is_password_complex, is_valid_email,
            verify_password,
        },
        repo::{EMAIL_TAKEN, USERNAME_TAKEN},
        repo_types::{NewUser, Role},
    },
    error::{AppError, Result},
    extract::AppJson,
    mailer::verification_email,
    state::AppState,
};

pub const VERIFICATION_TTL: Duration = Duration::hours(1);

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify-email", get(verify_email))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/session", get(session))
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let firstname = required(&payload.firstname, "firstname")?;
    let lastname = required(&payload.lastname, "lastname")?;
    let username = required(&payload.username, "username")?;
    let email = required(&payload.email, "email")?.to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::bad_request("Please enter a valid email address."));
    }

    if !is_password_complex(&payload.password) {
        warn!("password isn't complex enough");
        return Err(AppError::PasswordComplexity);
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already taken");
        return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
    }
    if state.users.find_by_username(&username).await?.is_some() {
        warn!(username = %username, "username already taken");
        return Err(AppError::Conflict(USERNAME_TAKEN.to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let token = generate_verification_token();
    let user = state
        .users
        .insert(NewUser {
            firstname,
            lastname,
            username,
            email,
            password_hash,
            // self-registration never grants Admin
            role: Role::User,
            verification_token: token.clone(),
            verification_token_expiry: OffsetDateTime::now_utc() + VERIFICATION_TTL,
        })
        .await?;

    let mail = verification_email(&state.config.base_url, &user.email, &token);
    if let Err(e) = state.mailer.send(mail).await {
        error!(error = ?e, user_id = %user.id, "verification email failed; removing user");
        if let Err(e) = state.users.delete(user.id).await {
            error!(error = ?e, user_id = %user.id, "failed to remove user after mail failure");
        }
        return Err(AppError::Internal(e));
    }

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Signup successful! Please check your email to verify your account.",
        )),
    ))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>> {
    if query.token.is_empty() {
        return Err(AppError::InvalidOrExpiredToken);
    }

    let user = state
        .users
        .verify_token(&query.token, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| {
            warn!("invalid or expired verification token");
            AppError::InvalidOrExpiredToken
        })?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::new(
        "Email verified successfully! Please close this page to login to the application!",
    )))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(HeaderMap, Json<SessionResponse>)> {
    let login = payload.email_or_username.trim();
    if login.is_empty() || payload.password.is_empty() {
        warn!("login with missing credentials");
        return Err(AppError::bad_request("Email/username and password are required"));
    }

    let user = match state.users.find_by_login(login).await? {
        Some(u) => u,
        None => {
            warn!(login = %login, "login unknown user");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AppError::Unverified);
    }

    let keys = JwtKeys::from_ref(&state);
    let signed = keys.sign(user.id)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&signed.token, keys.session_max_age(), state.config.production)?,
    );

    info!(user_id = %user.id, "user logged in");
    Ok((
        headers,
        Json(SessionResponse {
            user,
            expires_at: signed.expires_at,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie(state.config.production));
    (headers, Json(MessageResponse::new("User logged out successfully")))
}

#[instrument(skip(current))]
pub async fn session(current: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: current.user,
        expires_at: current.session_expires_at,
    })
}
