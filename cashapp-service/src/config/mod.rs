use cashapp_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct CashappConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub bootstrap: BootstrapConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Mark the session cookie Secure (requires HTTPS).
    pub secure_cookies: bool,
    pub expiry_hours: i64,
}

/// Initial admin account, created on first startup when no active admin exists.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub batch_size: usize,
}

impl CashappConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = CashappConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("cashapp-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("PORT", Some("5000"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            session: SessionConfig {
                secure_cookies: get_env("SESSION_SECURE_COOKIES", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
                expiry_hours: get_env("SESSION_EXPIRY_HOURS", Some("24"), is_prod)?
                    .parse()
                    .unwrap_or(24),
            },
            bootstrap: BootstrapConfig {
                admin_username: get_env("ADMIN_USERNAME", Some("admin"), is_prod)?,
                admin_password: get_env("ADMIN_PASSWORD", Some("admin"), is_prod)?,
            },
            import: ImportConfig {
                batch_size: get_env("IMPORT_BATCH_SIZE", Some("1000"), is_prod)?
                    .parse()
                    .unwrap_or(1000),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.import.batch_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "IMPORT_BATCH_SIZE must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod && self.bootstrap.admin_password.len() < 12 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_PASSWORD must be at least 12 characters in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
