use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub query_timeout_ms: u64,
    pub run_migrations: bool,
}

/// Token-bucket admission settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
    pub burst: u32,
    pub idle_eviction_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub token_ttl_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("UPLOADS_DIR") {
            self.server.uploads_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = v.parse().unwrap_or(self.server.max_upload_bytes);
        }

        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_QUERY_TIMEOUT_MS") {
            self.database.query_timeout_ms = v.parse().unwrap_or(self.database.query_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Rate limit overrides
        if let Ok(v) = env::var("LIMITER_ENABLED") {
            self.rate_limit.enabled = v.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(v) = env::var("LIMITER_RPS") {
            self.rate_limit.requests_per_second =
                v.parse().unwrap_or(self.rate_limit.requests_per_second);
        }
        if let Ok(v) = env::var("LIMITER_BURST") {
            self.rate_limit.burst = v.parse().unwrap_or(self.rate_limit.burst);
        }
        if let Ok(v) = env::var("LIMITER_IDLE_SECS") {
            self.rate_limit.idle_eviction_secs =
                v.parse().unwrap_or(self.rate_limit.idle_eviction_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("AUTH_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("TOKEN_TTL_HOURS") {
            self.security.token_ttl_hours = v.parse().unwrap_or(self.security.token_ttl_hours);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 4000,
                uploads_dir: PathBuf::from("./uploads"),
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                query_timeout_ms: 3_000,
                run_migrations: true,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: 2.0,
                burst: 4,
                idle_eviction_secs: 180,
            },
            security: SecurityConfig {
                jwt_secret: "development-secret".to_string(),
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                token_ttl_hours: 24,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 4000,
                uploads_dir: PathBuf::from("/var/lib/profile-service/uploads"),
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                query_timeout_ms: 3_000,
                run_migrations: true,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: 4.0,
                burst: 8,
                idle_eviction_secs: 180,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origins: vec!["https://staging.example.com".to_string()],
                token_ttl_hours: 24,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 4000,
                uploads_dir: PathBuf::from("/var/lib/profile-service/uploads"),
                max_upload_bytes: 2 * 1024 * 1024, // 2MB
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                query_timeout_ms: 3_000,
                run_migrations: false,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: 2.0,
                burst: 4,
                idle_eviction_secs: 180,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origins: vec!["https://app.example.com".to_string()],
                token_ttl_hours: 4,
            },
        }
    }
}

// Global snapshot - read once at startup and handed to components by value
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
