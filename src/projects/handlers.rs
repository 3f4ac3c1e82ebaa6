use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ProjectResponse, RemoveGalleryImageRequest},
    repo_types::Project,
    services::{self, FILE_LIMITS},
};
use crate::{
    auth::MessageResponse,
    error::{AppError, Result},
    extract::{AppJson, AppPath},
    state::AppState,
    uploads::{MultipartForm, MAX_UPLOAD_BYTES},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id", axum::routing::put(update_project).delete(delete_project))
        .route("/projects/:id/gallery", delete(remove_gallery_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip(state))]
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>> {
    Ok(Json(state.projects.list().await?))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Project>> {
    let project = state.projects.get(id).await?.ok_or(AppError::NotFound("Project"))?;
    Ok(Json(project))
}

/// POST /projects (multipart)
/// Fields: name, title?, category, description, location, thumbnail (1), gallery (up to 30)
#[instrument(skip(state, mp))]
pub async fn create_project(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    let form = MultipartForm::read(mp, FILE_LIMITS).await?;
    let project = services::create_project(&state, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            message: "Project created successfully",
            project,
        }),
    ))
}

#[instrument(skip(state, mp))]
pub async fn update_project(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    mp: Multipart,
) -> Result<Json<ProjectResponse>> {
    let form = MultipartForm::read(mp, FILE_LIMITS).await?;
    let project = services::update_project(&state, id, form).await?;
    Ok(Json(ProjectResponse {
        message: "Project updated successfully",
        project,
    }))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>> {
    services::delete_project(&state, id).await?;
    Ok(Json(MessageResponse::new("Project deleted successfully")))
}

#[instrument(skip(state, body))]
pub async fn remove_gallery_image(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<RemoveGalleryImageRequest>,
) -> Result<Json<ProjectResponse>> {
    let project = services::remove_gallery_image(&state, id, &body.image_url).await?;
    Ok(Json(ProjectResponse {
        message: "Gallery image removed",
        project,
    }))
}
