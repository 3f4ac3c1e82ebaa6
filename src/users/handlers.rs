use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{delete, get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{EmployeeQuery, EmployeesPage, UpdateEmployeeRequest, UpdateProfileRequest},
    export::employees_csv,
};
use crate::{
    auth::{
        extractors::CurrentUser,
        repo::USERNAME_TAKEN,
        repo_types::{EmployeeFilter, Role, User, UserUpdate},
        MessageResponse,
    },
    error::{AppError, Result},
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/get-all-employees", get(list_employees))
        .route("/export-all-employees-to-csv", get(export_all_employees))
        .route("/export-filtered-employees-to-csv", get(export_filtered_employees))
        .route("/update-employee/:id", put(update_employee))
        .route("/delete-employee/:id", delete(delete_employee))
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/user/:id", get(get_user).put(update_profile))
}

#[instrument(skip(state))]
pub async fn list_employees(
    State(state): State<AppState>,
    Query(q): Query<EmployeeQuery>,
) -> Result<Json<EmployeesPage>> {
    let filter = q.filter()?;
    let (page, limit) = (q.page(), q.limit());
    let offset = q.offset()?;
    let (employees, total) = state.users.list_employees(&filter, limit, offset).await?;
    Ok(Json(EmployeesPage {
        employees,
        total,
        page,
        limit,
    }))
}

fn csv_attachment(body: Vec<u8>, file_name: &str) -> Result<(HeaderMap, Vec<u8>)> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(anyhow::Error::from)?,
    );
    Ok((headers, body))
}

#[instrument(skip(state))]
pub async fn export_all_employees(State(state): State<AppState>) -> Result<(HeaderMap, Vec<u8>)> {
    let users = state.users.all_employees(&EmployeeFilter::default()).await?;
    csv_attachment(employees_csv(&users)?, "employees.csv")
}

#[instrument(skip(state))]
pub async fn export_filtered_employees(
    State(state): State<AppState>,
    Query(q): Query<EmployeeQuery>,
) -> Result<(HeaderMap, Vec<u8>)> {
    let users = state.users.all_employees(&q.filter()?).await?;
    csv_attachment(employees_csv(&users)?, "filtered_employees.csv")
}

/// 409 if `username` already belongs to someone other than `id`.
async fn ensure_username_free(state: &AppState, id: Uuid, update: &UserUpdate) -> Result<()> {
    if let Some(username) = update.username.as_deref() {
        if let Some(other) = state.users.find_by_username(username).await? {
            if other.id != id {
                warn!(username = %username, "username already taken");
                return Err(AppError::Conflict(USERNAME_TAKEN.to_string()));
            }
        }
    }
    Ok(())
}

async fn apply_update(state: &AppState, id: Uuid, update: UserUpdate, what: &'static str) -> Result<User> {
    if state.users.find_by_id(id).await?.is_none() {
        return Err(AppError::NotFound(what));
    }
    ensure_username_free(state, id, &update).await?;
    state
        .users
        .update(id, update)
        .await?
        .ok_or(AppError::NotFound(what))
}

#[instrument(skip(state, body))]
pub async fn update_employee(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateEmployeeRequest>,
) -> Result<Json<User>> {
    let user = apply_update(&state, id, body.into(), "Employee").await?;
    info!(user_id = %id, "employee updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_employee(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>> {
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("Employee"));
    }
    info!(user_id = %id, "employee deleted");
    Ok(Json(MessageResponse::new("Employee deleted successfully")))
}

#[instrument(skip(state))]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>> {
    Ok(Json(state.users.distinct_roles().await?))
}

fn ensure_self_or_admin(current: &CurrentUser, id: Uuid) -> Result<()> {
    if current.user.id == id || current.user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[instrument(skip(state, current))]
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<User>> {
    ensure_self_or_admin(&current, id)?;
    let user = state.users.find_by_id(id).await?.ok_or(AppError::NotFound("User"))?;
    Ok(Json(user))
}

#[instrument(skip(state, current, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateProfileRequest>,
) -> Result<Json<User>> {
    ensure_self_or_admin(&current, id)?;
    let user = apply_update(&state, id, body.into(), "User").await?;
    info!(user_id = %id, "profile updated");
    Ok(Json(user))
}
