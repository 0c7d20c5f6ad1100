use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::env;

const DEV_JWT_SECRET: &str = "rainbow-social-development-secret";

/// Upper bound on `JWT_EXPIRY_HOURS` (one year).
pub const MAX_JWT_EXPIRY_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Pagination
    pub default_page_size: u32,
    pub max_page_size: u32,

    // Feed
    pub feed_include_own_posts: bool,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub rate_limit_burst: u32,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "rainbow_social=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),
            database_url: "memory".to_string(),
            database_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24 * 7,
            default_page_size: 10,
            max_page_size: 100,
            feed_include_own_posts: false,
            rate_limit_requests: 100,
            rate_limit_burst: 10,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        let environment = env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment == "production" => bail!("JWT_SECRET must be set in production"),
            Err(_) => defaults.jwt_secret,
        };

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            environment,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),

            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,

            jwt_secret,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", defaults.jwt_expiry_hours)?,

            default_page_size: parse_var("DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_var("MAX_PAGE_SIZE", defaults.max_page_size)?,

            feed_include_own_posts: parse_var(
                "FEED_INCLUDE_OWN_POSTS",
                defaults.feed_include_own_posts,
            )?,

            rate_limit_requests: parse_var("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst)?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations that would make pagination or rate limiting unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            bail!("page sizes must be positive");
        }
        if self.default_page_size > self.max_page_size {
            bail!(
                "DEFAULT_PAGE_SIZE ({}) exceeds MAX_PAGE_SIZE ({})",
                self.default_page_size,
                self.max_page_size
            );
        }
        if self.rate_limit_requests == 0 || self.rate_limit_burst == 0 {
            bail!("rate limit quota must be positive");
        }
        if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&self.jwt_expiry_hours) {
            bail!(
                "JWT_EXPIRY_HOURS must be between 1 and {} (got {})",
                MAX_JWT_EXPIRY_HOURS,
                self.jwt_expiry_hours
            );
        }
        if self.is_production() && self.jwt_secret == DEV_JWT_SECRET {
            bail!("refusing to run in production with the development JWT secret");
        }
        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_memory_store());
        assert!(!config.is_production());
        assert!(!config.feed_include_own_posts);
    }

    #[test]
    fn default_page_size_cannot_exceed_max() {
        let config = Config {
            default_page_size: 50,
            max_page_size: 20,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_requires_real_secret() {
        let config = Config {
            environment: "production".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn jwt_expiry_must_be_bounded() {
        for hours in [0, -1, MAX_JWT_EXPIRY_HOURS + 1, i64::MAX] {
            let config = Config {
                jwt_expiry_hours: hours,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{} hours accepted", hours);
        }

        let config = Config {
            jwt_expiry_hours: MAX_JWT_EXPIRY_HOURS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
