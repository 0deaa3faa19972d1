use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "lupad-dev-access-secret";
const DEV_JWT_REFRESH_SECRET: &str = "lupad-dev-refresh-secret";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub registration_ttl: Duration,
    pub otp_max_attempts: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            redis_url: try_load("REDIS_URL", "redis://localhost:6379")?,
            store_backend: try_load("STORE_BACKEND", "redis")?,
            log_format: try_load("LOG_FORMAT", "pretty")?,
            jwt_secret: read_secret("JWT_SECRET", DEV_JWT_SECRET),
            jwt_refresh_secret: read_secret("JWT_REFRESH_SECRET", DEV_JWT_REFRESH_SECRET),
            access_token_ttl: Duration::from_secs(try_load("ACCESS_TOKEN_TTL_SECS", "900")?),
            refresh_token_ttl: Duration::from_secs(try_load(
                "REFRESH_TOKEN_TTL_SECS",
                "604800",
            )?),
            otp_ttl: Duration::from_secs(try_load("OTP_TTL_SECS", "300")?),
            registration_ttl: Duration::from_secs(try_load("REGISTRATION_TTL_SECS", "600")?),
            otp_max_attempts: try_load("OTP_MAX_ATTEMPTS", "5")?,
        })
    }
}

impl Default for Config {
    /// Development settings backed by in-memory storage.
    fn default() -> Self {
        Self {
            port: 3000,
            redis_url: "redis://localhost:6379".to_string(),
            store_backend: StoreBackend::Memory,
            log_format: LogFormat::Pretty,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_refresh_secret: DEV_JWT_REFRESH_SECRET.to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            otp_ttl: Duration::from_secs(5 * 60),
            registration_ttl: Duration::from_secs(10 * 60),
            otp_max_attempts: 5,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str, fallback: &str) -> String {
    if let Some(value) = var(secret_name) {
        return value;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|e| {
            warn!("Failed to read {secret_name} from {path}: {e}, using development secret");
            fallback.to_string()
        })
}
