use std::time::Duration;

use anyhow::{Context, Result};
use platform_db::DatabaseSettings;
use products_crm::ControllerConfig;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    pub controller: ControllerConfig,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` when present.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database = match lookup("DATABASE_URL") {
            Some(url) => DatabaseSettings::with_url(url),
            None => DatabaseSettings::from_env(),
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let mut controller = ControllerConfig::default();
        if let Some(raw) = lookup("STAGE_UPDATE_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid STAGE_UPDATE_TIMEOUT_MS {raw:?}"))?;
            anyhow::ensure!(millis > 0, "STAGE_UPDATE_TIMEOUT_MS must be positive");
            controller.stage_update_timeout = Duration::from_millis(millis);
        }

        Ok(Self {
            database,
            cors_allowed_origins,
            controller,
        })
    }
}
