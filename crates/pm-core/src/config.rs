//! Configuration loading
//!
//! All configuration is read from the environment once at process start and
//! is immutable afterwards. The JWT signing key lives here; it is redacted
//! from `Debug` output and must never appear in logs or API responses.

use serde::Deserialize;

use crate::error::{PmError, PmResult};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When true, 500 responses include internal error detail. Development
    /// aid only; defaults to false.
    pub expose_internal_errors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing key for tokens. Process-wide, loaded once.
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            expose_internal_errors: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pm".into(),
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// `PM_JWT_SECRET` is mandatory and must be long enough for HMAC-SHA512;
    /// everything else has a sensible default.
    pub fn from_env() -> PmResult<Self> {
        let jwt_secret = std::env::var("PM_JWT_SECRET")
            .map_err(|_| PmError::Config("PM_JWT_SECRET is not set".into()))?;

        Ok(Self {
            server: ServerConfig {
                host: env_or("PM_HOST", "0.0.0.0"),
                port: env_parse("PM_PORT", 8080)?,
                expose_internal_errors: env_parse("PM_EXPOSE_INTERNAL_ERRORS", false)?,
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgres://localhost/pm"),
                max_connections: env_parse("DB_MAX_CONNECTIONS", 10)?,
                connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT", 30)?,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_secs: env_parse("PM_TOKEN_TTL_SECS", 86_400)?,
            },
        })
    }

    /// Socket address string for the HTTP listener
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> PmResult<T>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PmError::Config(format!("invalid value for {}", key))),
        Err(_) => Ok(default),
    }
}
