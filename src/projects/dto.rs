use serde::{Deserialize, Serialize};

use super::repo_types::Project;

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub message: &'static str,
    pub project: Project,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveGalleryImageRequest {
    pub image_url: String,
}
