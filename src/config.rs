use std::env;

use thiserror::Error;

pub const SECRET: &str = "SECRET";
pub const DATABASE_PATH: &str = "DATABASE_PATH";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const CORS_ORIGIN: &str = "CORS_ORIGIN";
pub const BCRYPT_COST: &str = "BCRYPT_COST";

const DEFAULT_DATABASE_PATH: &str = "sharedocs.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{SECRET} is not set, refusing to start without a token signing key")]
    MissingSecret,

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Signing key for session tokens. Loaded once, never rotated.
    pub secret: String,
    pub database_path: String,
    pub bind_addr: String,
    pub cors_origin: Option<String>,
    pub bcrypt_cost: u32,
}

impl Config {
    /// Reads the process environment, after loading a `.env` file if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let secret = env::var(SECRET)
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let bcrypt_cost = match env::var(BCRYPT_COST) {
            Ok(value) => value
                .parse::<u32>()
                .ok()
                .filter(|cost| (4..=31).contains(cost))
                .ok_or(ConfigError::Invalid {
                    key: BCRYPT_COST,
                    value,
                })?,
            Err(_) => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            secret,
            database_path: env::var(DATABASE_PATH)
                .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string()),
            bind_addr: env::var(BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            cors_origin: env::var(CORS_ORIGIN).ok().filter(|origin| !origin.is_empty()),
            bcrypt_cost,
        })
    }

    /// In-memory database and the cheapest bcrypt cost.
    pub fn for_tests(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            database_path: ":memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            cors_origin: None,
            bcrypt_cost: 4,
        }
    }
}
