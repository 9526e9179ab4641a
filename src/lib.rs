pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod movies;
pub mod names;
pub mod pagination;
pub mod routes;
pub mod upload;

use std::{net::IpAddr, num::NonZeroU32, sync::Arc};

use anyhow::Context;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use sea_orm::DatabaseConnection;

use crate::{auth::mailer::Mailer, config::Config, upload::UploadStore};

pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub uploads: UploadStore,
    pub mailer: Arc<dyn Mailer>,
    /// Signup, login and password-reset attempts, bucketed per client address.
    pub auth_limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl AppState {
    /// Connects, migrates, seeds the configured administrator and prepares the upload root.
    pub async fn init(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Arc<Self>> {
        let db = db::connect_and_migrate(&config.database_url).await.context("database setup")?;

        if let Some(seed) = &config.admin {
            auth::ensure_admin(&db, seed).await.context("admin seed")?;
        }

        let uploads = UploadStore::new(config.upload_dir.clone());
        uploads.prepare().await.context("upload directory")?;

        let rps = NonZeroU32::new(config.auth_rps.max(1)).unwrap_or(NonZeroU32::MIN);
        let auth_limiter = RateLimiter::keyed(Quota::per_second(rps));

        Ok(Arc::new(Self { config: Arc::new(config), db, uploads, mailer, auth_limiter }))
    }
}
