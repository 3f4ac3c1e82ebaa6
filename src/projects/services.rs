use tracing::info;
use uuid::Uuid;

use super::repo_types::{NewProject, Project, ProjectUpdate};
use crate::{
    error::{AppError, Result},
    state::AppState,
    uploads::{remove_all_best_effort, remove_best_effort, upload, upload_all, MultipartForm},
};

pub const THUMBNAIL_PREFIX: &str = "projects/thumbnails";
pub const GALLERY_PREFIX: &str = "projects/gallery";
pub const FILE_LIMITS: &[(&str, usize)] = &[("thumbnail", 1), ("gallery", 30)];

/// Uploads the thumbnail and gallery, then inserts the row.
pub async fn create_project(st: &AppState, mut form: MultipartForm) -> Result<Project> {
    let (Some(name), Some(category), Some(description), Some(location)) = (
        form.text("name"),
        form.text("category"),
        form.text("description"),
        form.text("location"),
    ) else {
        return Err(AppError::bad_request(
            "Name, category, description, and location are required",
        ));
    };
    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| AppError::bad_request("Thumbnail image is required."))?;

    let thumbnail_url = upload(st, THUMBNAIL_PREFIX, thumbnail).await?;
    let gallery = upload_all(st, GALLERY_PREFIX, form.take_files("gallery")).await?;

    let project = st
        .projects
        .insert(NewProject {
            name,
            title: form.text("title"),
            category,
            description,
            location,
            thumbnail_url,
            gallery,
        })
        .await?;

    info!(project_id = %project.id, gallery = project.gallery.len(), "project created");
    Ok(project)
}

/// Applies text changes, replaces the thumbnail if a new one is sent and
/// appends new gallery images. The old thumbnail is removed only after the
/// row points at its replacement.
pub async fn update_project(st: &AppState, id: Uuid, mut form: MultipartForm) -> Result<Project> {
    let existing = st.projects.get(id).await?.ok_or(AppError::NotFound("Project"))?;

    let mut update = ProjectUpdate {
        name: form.text("name"),
        title: form.text("title"),
        category: form.text("category"),
        description: form.text("description"),
        location: form.text("location"),
        ..Default::default()
    };

    if let Some(thumbnail) = form.take_file("thumbnail") {
        update.thumbnail_url = Some(upload(st, THUMBNAIL_PREFIX, thumbnail).await?);
    }
    update.append_gallery = upload_all(st, GALLERY_PREFIX, form.take_files("gallery")).await?;
    let replaced_thumbnail = update.thumbnail_url.is_some();

    let project = st
        .projects
        .update(id, update)
        .await?
        .ok_or(AppError::NotFound("Project"))?;
    if replaced_thumbnail {
        remove_best_effort(st, &existing.thumbnail_url).await;
    }
    info!(project_id = %project.id, "project updated");
    Ok(project)
}

/// Deletes the row, then every object it referenced. Storage failures do not
/// fail the request.
pub async fn delete_project(st: &AppState, id: Uuid) -> Result<()> {
    let project = st.projects.delete(id).await?.ok_or(AppError::NotFound("Project"))?;
    remove_all_best_effort(st, &project.asset_urls()).await;
    info!(project_id = %id, "project deleted");
    Ok(())
}

pub async fn remove_gallery_image(st: &AppState, id: Uuid, url: &str) -> Result<Project> {
    if st.projects.get(id).await?.is_none() {
        return Err(AppError::NotFound("Project"));
    }
    let project = st
        .projects
        .remove_gallery_image(id, url)
        .await?
        .ok_or(AppError::NotFound("Gallery image"))?;
    remove_best_effort(st, url).await;
    Ok(project)
}
