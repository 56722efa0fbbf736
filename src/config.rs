use std::{env, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub app_url: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub firebase_project_id: Option<String>,
    pub default_role: String,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value: raw })?,
            None => 3000,
        };

        let session_ttl_hours = match non_empty("SESSION_TTL_HOURS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => return Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", value: raw }),
            },
            None => 24,
        };

        let app_url = non_empty("APP_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            port,
            app_url,
            jwt_secret: non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            session_ttl_hours,
            firebase_project_id: non_empty("FIREBASE_PROJECT_ID"),
            default_role: non_empty("DEFAULT_ROLE").unwrap_or_else(|| "customer".to_string()),
            catalog_path: non_empty("CATALOG_PATH").map(PathBuf::from),
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}
