//! Configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Directory where uploaded admission files (and their annotated
    /// reports) are stored
    pub uploads_dir: PathBuf,

    /// Base URL of the platform, used in notification emails
    pub platform_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let uploads_dir = std::env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let platform_base_url = std::env::var("PLATFORM_BASE_URL")
            .unwrap_or_else(|_| "https://qverse.example.edu".to_string());

        Ok(Self {
            nats_url,
            database_url,
            uploads_dir,
            platform_base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uploads_dir_uses_env_when_set() {
        std::env::set_var("UPLOADS_DIR", "/tmp/qverse-uploads");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.uploads_dir, PathBuf::from("/tmp/qverse-uploads"));

        // Cleanup
        std::env::remove_var("UPLOADS_DIR");
    }

    #[test]
    fn test_config_platform_base_url_uses_env_when_set() {
        std::env::set_var("PLATFORM_BASE_URL", "https://portal.university.edu");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.platform_base_url, "https://portal.university.edu");

        // Cleanup
        std::env::remove_var("PLATFORM_BASE_URL");
    }
}
