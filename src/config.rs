// src/config.rs

use std::{env, fmt, net::SocketAddr};

use dotenvy::dotenv;

/// Exact number of questions a package must hold to be attemptable,
/// and the most it may ever hold.
pub const QUESTIONS_PER_PACKAGE: i64 = 110;

/// Wall-clock limit for a single attempt (2 hours).
pub const ATTEMPT_TIME_LIMIT_SECS: i64 = 7200;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;
pub const MAX_OPTION_LEN: u64 = 255;

pub const PACKAGES_PER_PAGE: i64 = 10;
pub const QUESTIONS_PER_PAGE: i64 = 20;
pub const USERS_PER_PAGE: i64 = 20;
pub const RECENT_ATTEMPTS_LIMIT: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, value) => write!(f, "{} has an invalid value: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = match env::var("JWT_EXPIRATION") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("JWT_EXPIRATION", raw))?,
            Err(_) => 86_400,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::Invalid("BIND_ADDR", raw))?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}
