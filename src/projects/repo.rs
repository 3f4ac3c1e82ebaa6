use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewProject, Project, ProjectUpdate};

const PROJECT_COLUMNS: &str = "id, name, title, category, description, location, \
     thumbnail_url, gallery, created_at, updated_at";

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Project>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Project>>;
    async fn insert(&self, project: NewProject) -> anyhow::Result<Project>;
    async fn update(&self, id: Uuid, update: ProjectUpdate) -> anyhow::Result<Option<Project>>;
    /// Returns the deleted row so its objects can be cleaned up.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>>;
    /// Drops one URL from the gallery. `None` if the project or URL is absent.
    async fn remove_gallery_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<Project>>;
}

pub struct PgProjectStore {
    db: PgPool,
}

impl PgProjectStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn list(&self) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list projects")?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get project")?;
        Ok(row)
    }

    async fn insert(&self, p: NewProject) -> anyhow::Result<Project> {
        let row = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (name, title, category, description, location, thumbnail_url, gallery)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(&p.name)
        .bind(&p.title)
        .bind(&p.category)
        .bind(&p.description)
        .bind(&p.location)
        .bind(&p.thumbnail_url)
        .bind(&p.gallery)
        .fetch_one(&self.db)
        .await
        .context("insert project")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, u: ProjectUpdate) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
               SET name = COALESCE($2, name),
                   title = COALESCE($3, title),
                   category = COALESCE($4, category),
                   description = COALESCE($5, description),
                   location = COALESCE($6, location),
                   thumbnail_url = COALESCE($7, thumbnail_url),
                   gallery = gallery || $8,
                   updated_at = now()
             WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(u.name)
        .bind(u.title)
        .bind(u.category)
        .bind(u.description)
        .bind(u.location)
        .bind(u.thumbnail_url)
        .bind(u.append_gallery)
        .fetch_optional(&self.db)
        .await
        .context("update project")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, Project>(&format!(
            "DELETE FROM projects WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete project")?;
        Ok(row)
    }

    async fn remove_gallery_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
               SET gallery = array_remove(gallery, $2),
                   updated_at = now()
             WHERE id = $1 AND $2 = ANY(gallery)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("remove gallery image")?;
        Ok(row)
    }
}
