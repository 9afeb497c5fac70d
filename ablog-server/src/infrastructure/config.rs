use super::password::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:8000,http://127.0.0.1:8000";

/// Where the server keeps its data.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// JSON document store; in memory only when `path` is `None`.
    Local { path: Option<PathBuf> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub http_host: String,
    pub http_port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let storage = match env_or("STORAGE_BACKEND", "postgres").as_str() {
            "postgres" => StorageBackend::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL must be set for the postgres backend")?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", "5")
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            },
            "local" => StorageBackend::Local {
                path: std::env::var("LOCAL_STORE_PATH")
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
            },
            other => bail!(
                "Unknown STORAGE_BACKEND '{}', expected 'postgres' or 'local'",
                other
            ),
        };

        let bcrypt_cost = env_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())
            .parse()
            .context("BCRYPT_COST must be a number")?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            );
        }

        let http_port = env_or("HTTP_PORT", "3000")
            .parse()
            .context("HTTP_PORT must be a valid port")?;

        let cors_allowed_origins = env_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            storage,
            jwt_secret,
            bcrypt_cost,
            http_host: env_or("HTTP_HOST", "0.0.0.0"),
            http_port,
            cors_allowed_origins,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 9] = [
        "JWT_SECRET",
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
        "LOCAL_STORE_PATH",
        "BCRYPT_COST",
        "HTTP_HOST",
        "HTTP_PORT",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn local_backend_with_defaults() {
        clear_env();
        std::env::set_var("JWT_SECRET", "a-secret-that-is-long-enough-for-hs256");
        std::env::set_var("STORAGE_BACKEND", "local");

        let config = Config::from_env().unwrap();

        assert_eq!(config.storage, StorageBackend::Local { path: None });
        assert_eq!(config.http_addr(), "0.0.0.0:3000");
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:8000", "http://127.0.0.1:8000"]
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn postgres_backend_requires_database_url() {
        clear_env();
        std::env::set_var("JWT_SECRET", "secret");

        assert!(Config::from_env().is_err());

        std::env::set_var("DATABASE_URL", "postgres://localhost/ablog");
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "12");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/ablog".to_string(),
                max_connections: 12,
            }
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unknown_backend_and_missing_secret() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "local");
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", "secret");
        std::env::set_var("STORAGE_BACKEND", "sqlite");
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
