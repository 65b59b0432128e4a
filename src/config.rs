/// Configuration management for the Optima admin backend
use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Upper bound for one request, store calls included
    pub request_timeout_secs: u64,
}

/// Which entity store adapter backs the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> AdminResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            _ => Err(AdminError::InvalidInput(format!("Invalid store backend: {}", s))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Shared key a new admin must present to register
    pub registration_key: Option<String>,
    pub token_ttl_hours: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AdminResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ADMIN_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("ADMIN_PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .map_err(|_| AdminError::InvalidInput("Invalid port number".to_string()))?;
        let version = env::var("ADMIN_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let request_timeout_secs = env::var("ADMIN_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let backend = StoreBackend::from_str(
            &env::var("ADMIN_STORE_BACKEND").unwrap_or_else(|_| "sqlite".to_string()),
        )?;
        let sqlite_path = env::var("ADMIN_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/optima.sqlite"));

        let jwt_secret = env::var("ADMIN_SECRET_KEY")
            .map_err(|_| AdminError::InvalidInput("ADMIN_SECRET_KEY required".to_string()))?;
        let registration_key = env::var("ADMIN_REGISTRATION_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let token_ttl_hours = env::var("ADMIN_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                request_timeout_secs,
            },
            storage: StorageConfig {
                backend,
                sqlite_path,
            },
            authentication: AuthConfig {
                jwt_secret,
                registration_key,
                token_ttl_hours,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Configuration for tests: in-memory store, fixed secrets
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
                request_timeout_secs: 30,
            },
            storage: StorageConfig {
                backend: StoreBackend::Memory,
                sqlite_path: PathBuf::from("./data/test.sqlite"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-that-is-at-least-32-chars".to_string(),
                registration_key: Some("let-me-in".to_string()),
                token_ttl_hours: 24,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AdminResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AdminError::InvalidInput("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AdminError::InvalidInput(
                "ADMIN_SECRET_KEY must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_hours <= 0 {
            return Err(AdminError::InvalidInput(
                "ADMIN_TOKEN_TTL_HOURS must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::from_str("memory").unwrap(), StoreBackend::Memory);
        assert_eq!(StoreBackend::from_str(" SQLite ").unwrap(), StoreBackend::Sqlite);
        assert!(StoreBackend::from_str("firestore").is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = ServerConfig::for_tests();
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::for_tests();
        config.service.hostname.clear();
        assert!(config.validate().is_err());
    }
}
