use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo_types::{NewService, Service, ServiceUpdate};
use crate::{
    auth::MessageResponse,
    error::{AppError, Result},
    extract::AppPath,
    state::AppState,
    uploads::{remove_best_effort, upload, MultipartForm, MAX_UPLOAD_BYTES},
};

const ICON_PREFIX: &str = "services/icons";
const FILE_LIMITS: &[(&str, usize)] = &[("icon", 1)];

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub message: &'static str,
    pub service: Service,
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services))
        .route("/services/:id", get(get_service))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/services", post(create_service))
        .route("/services/:id", put(update_service).delete(delete_service))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip(state))]
pub async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>> {
    Ok(Json(state.services.list().await?))
}

#[instrument(skip(state))]
pub async fn get_service(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Service>> {
    let service = state.services.get(id).await?.ok_or(AppError::NotFound("Service"))?;
    Ok(Json(service))
}

/// POST /services (multipart): name, description, icon
#[instrument(skip(state, mp))]
pub async fn create_service(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<ServiceResponse>)> {
    let mut form = MultipartForm::read(mp, FILE_LIMITS).await?;
    let (Some(name), Some(description)) = (form.text("name"), form.text("description")) else {
        return Err(AppError::bad_request("Name and description are required"));
    };
    let icon = form
        .take_file("icon")
        .ok_or_else(|| AppError::bad_request("Service icon is required"))?;

    let icon_url = upload(&state, ICON_PREFIX, icon).await?;
    let service = state
        .services
        .insert(NewService {
            name,
            description,
            icon_url,
        })
        .await?;

    info!(service_id = %service.id, "service created");
    Ok((
        StatusCode::CREATED,
        Json(ServiceResponse {
            message: "Service created successfully",
            service,
        }),
    ))
}

#[instrument(skip(state, mp))]
pub async fn update_service(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    mp: Multipart,
) -> Result<Json<ServiceResponse>> {
    let mut form = MultipartForm::read(mp, FILE_LIMITS).await?;
    let existing = state.services.get(id).await?.ok_or(AppError::NotFound("Service"))?;

    let mut update = ServiceUpdate {
        name: form.text("name"),
        description: form.text("description"),
        icon_url: None,
    };
    if let Some(icon) = form.take_file("icon") {
        update.icon_url = Some(upload(&state, ICON_PREFIX, icon).await?);
    }
    let replaced_icon = update.icon_url.is_some();

    let service = state
        .services
        .update(id, update)
        .await?
        .ok_or(AppError::NotFound("Service"))?;
    // old icon goes only once the row points at the new one
    if replaced_icon {
        remove_best_effort(&state, &existing.icon_url).await;
    }
    info!(service_id = %service.id, "service updated");
    Ok(Json(ServiceResponse {
        message: "Service updated successfully",
        service,
    }))
}

#[instrument(skip(state))]
pub async fn delete_service(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>> {
    let service = state.services.delete(id).await?.ok_or(AppError::NotFound("Service"))?;
    remove_best_effort(&state, &service.icon_url).await;
    info!(service_id = %id, "service deleted");
    Ok(Json(MessageResponse::new("Service deleted successfully")))
}
