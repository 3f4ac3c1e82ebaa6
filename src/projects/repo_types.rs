use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub category: String,
    pub description: String,
    pub location: String,
    pub thumbnail_url: String,
    pub gallery: Vec<String>, // public URLs, display order
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Project {
    /// Every object URL the project owns.
    pub fn asset_urls(&self) -> Vec<String> {
        std::iter::once(self.thumbnail_url.clone())
            .chain(self.gallery.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub title: Option<String>,
    pub category: String,
    pub description: String,
    pub location: String,
    pub thumbnail_url: String,
    pub gallery: Vec<String>,
}

/// Partial update; `None` keeps the stored value. `append_gallery` is added
/// after the existing gallery entries.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub thumbnail_url: Option<String>,
    pub append_gallery: Vec<String>,
}
