//! Configuration module
//!
//! Configuration for the store and its background worker, loaded from the
//! environment (a `.env` file is honored via `dotenvy`). Every knob has a
//! development-friendly default so the worker can start with nothing but a
//! `DATABASE_URL`.

use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 24 * 3600;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 3600;

/// Application configuration shared by the services and the worker binary.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Root directory for original blobs.
    pub uploads_root: PathBuf,
    /// Root directory for derived thumbnails; mirrors `uploads_root` filenames.
    pub thumbnails_root: PathBuf,
    /// Root directory for in-flight chunk sessions.
    pub chunk_temp_dir: PathBuf,
    /// Days a trashed resource survives before the purge job removes it.
    pub trash_retention_days: i64,
    /// Interval between purge job runs.
    pub purge_interval_secs: u64,
    /// Age after which an abandoned upload session is reaped.
    pub upload_session_ttl_secs: u64,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Config {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            uploads_root: env_path("UPLOADS_ROOT", "data/uploads"),
            thumbnails_root: env_path("THUMBNAILS_ROOT", "data/thumbnails"),
            chunk_temp_dir: env_path("CHUNK_TEMP_DIR", "data/temp_chunks"),
            trash_retention_days: env_parse("TRASH_RETENTION_DAYS", DEFAULT_TRASH_RETENTION_DAYS),
            purge_interval_secs: env_parse("PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS),
            upload_session_ttl_secs: env_parse(
                "UPLOAD_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            ),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        // Key is unset in the test environment
        assert_eq!(env_parse("CUMULUS_TEST_UNSET_KEY", 7u32), 7);
    }

    #[test]
    fn test_is_production() {
        let mk = |environment: &str| Config {
            database_url: "postgres://localhost/cumulus".into(),
            db_max_connections: 5,
            uploads_root: "u".into(),
            thumbnails_root: "t".into(),
            chunk_temp_dir: "c".into(),
            trash_retention_days: 30,
            purge_interval_secs: 60,
            upload_session_ttl_secs: 60,
            environment: environment.into(),
        };
        assert!(mk("production").is_production());
        assert!(mk("Prod").is_production());
        assert!(!mk("development").is_production());
    }
}
