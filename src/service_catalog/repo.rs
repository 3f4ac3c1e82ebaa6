use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewService, Service, ServiceUpdate};

const SERVICE_COLUMNS: &str = "id, name, description, icon_url, created_at, updated_at";

#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Service>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Service>>;
    async fn insert(&self, service: NewService) -> anyhow::Result<Service>;
    async fn update(&self, id: Uuid, update: ServiceUpdate) -> anyhow::Result<Option<Service>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Service>>;
}

pub struct PgServiceStore {
    db: PgPool,
}

impl PgServiceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServiceStore for PgServiceStore {
    async fn list(&self) -> anyhow::Result<Vec<Service>> {
        let rows = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list services")?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get service")?;
        Ok(row)
    }

    async fn insert(&self, s: NewService) -> anyhow::Result<Service> {
        let row = sqlx::query_as::<_, Service>(&format!(
            r#"
            INSERT INTO services (name, description, icon_url)
            VALUES ($1, $2, $3)
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(&s.name)
        .bind(&s.description)
        .bind(&s.icon_url)
        .fetch_one(&self.db)
        .await
        .context("insert service")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, u: ServiceUpdate) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, Service>(&format!(
            r#"
            UPDATE services
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   icon_url = COALESCE($4, icon_url),
                   updated_at = now()
             WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(u.name)
        .bind(u.description)
        .bind(u.icon_url)
        .fetch_optional(&self.db)
        .await
        .context("update service")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, Service>(&format!(
            "DELETE FROM services WHERE id = $1 RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete service")?;
        Ok(row)
    }
}
