use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::mailer::{Mailer, SmtpMailer};
use crate::projects::repo::{PgProjectStore, ProjectStore};
use crate::service_catalog::repo::{PgServiceStore, ServiceStore};
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub services: Arc<dyn ServiceStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
    #[cfg(test)]
    pub fakes: Option<crate::testing::Fakes>,
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer = Arc::new(SmtpMailer::new(&config.mail)?) as Arc<dyn Mailer>;

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(PgUserStore::new(db.clone())),
            projects: Arc::new(PgProjectStore::new(db.clone())),
            services: Arc::new(PgServiceStore::new(db)),
            storage,
            mailer,
            #[cfg(test)]
            fakes: None,
        })
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    use anyhow::Context;

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}
