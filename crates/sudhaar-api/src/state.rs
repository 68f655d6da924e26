use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::{error, warn};

use sudhaar_db::Database;

use crate::error::AppError;

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(7),
        }
    }
}

/// Server settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("SUDHAAR_JWT_SECRET", DEFAULT_JWT_SECRET);
        if jwt_secret == DEFAULT_JWT_SECRET {
            warn!("SUDHAAR_JWT_SECRET is not set; using the development secret");
        }

        let port: u16 = var("SUDHAAR_PORT", "8000")
            .parse()
            .context("SUDHAAR_PORT must be a port number")?;
        let access_minutes: i64 = var("SUDHAAR_ACCESS_TOKEN_MINUTES", "60")
            .parse()
            .context("SUDHAAR_ACCESS_TOKEN_MINUTES must be a whole number")?;
        let refresh_days: i64 = var("SUDHAAR_REFRESH_TOKEN_DAYS", "7")
            .parse()
            .context("SUDHAAR_REFRESH_TOKEN_DAYS must be a whole number")?;

        Ok(Self {
            host: var("SUDHAAR_HOST", "0.0.0.0"),
            port,
            db_path: var("SUDHAAR_DB_PATH", "sudhaar.db"),
            auth: AuthConfig {
                jwt_secret,
                access_ttl: Duration::minutes(access_minutes),
                refresh_ttl: Duration::days(refresh_days),
            },
        })
    }
}

/// Runs blocking database work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}
