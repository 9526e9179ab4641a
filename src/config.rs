use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub client_url: String,
    pub cors_origin: Option<String>,
    pub session_ttl_days: i64,
    pub auth_rps: u32,
    pub max_upload_bytes: usize,
    pub admin: Option<AdminSeed>,
}

fn megabytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

/// Credentials for the administrator account created on first start.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "5000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://dramalist.db?mode=rwc".to_string());

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let client_url =
            std::env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|s| !s.trim().is_empty());

        let session_ttl_days: i64 =
            std::env::var("SESSION_TTL_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(7);

        let auth_rps: u32 =
            std::env::var("AUTH_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let max_upload_mb: usize =
            std::env::var("MAX_UPLOAD_MB").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(AdminSeed { email: email.trim().to_lowercase(), password })
            },
            _ => None,
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            upload_dir: PathBuf::from(upload_dir),
            client_url,
            cors_origin,
            session_ttl_days,
            auth_rps,
            max_upload_bytes: megabytes(max_upload_mb),
            admin,
        })
    }

    /// Defaults suitable for tests: the database and uploads live wherever the caller points them.
    pub fn for_paths(database_url: impl Into<String>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: database_url.into(),
            upload_dir: upload_dir.into(),
            client_url: "http://localhost:5173".to_string(),
            cors_origin: None,
            session_ttl_days: 7,
            auth_rps: 1000,
            max_upload_bytes: megabytes(10),
            admin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_saturates() {
        assert_eq!(megabytes(10), 10 * 1024 * 1024);
        assert_eq!(megabytes(usize::MAX), usize::MAX);
        assert_eq!(megabytes(usize::MAX / 1024), usize::MAX);
    }
}
