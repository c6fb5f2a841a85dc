//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PLAZA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SMTP_HOST` - SMTP relay hostname
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `MAIL_FROM` - Sender address for outbound mail
//!
//! ## Optional
//! - `PLAZA_HOST` - Bind address (default: 127.0.0.1)
//! - `PLAZA_PORT` - Listen port (default: 3000)
//! - `SMTP_PORT` - SMTP relay port (default: 587)
//! - `OTP_TTL_MINUTES` - Verification code validity window (default: 15)
//! - `RETENTION_MONTHS` - Post retention window (default: 12)
//! - `ENGAGEMENT_THRESHOLD` - Post count that qualifies for a nudge (default: 2)
//! - `ENGAGEMENT_RENOTIFY_HOURS` - Minimum gap between nudges per account (default: 8)
//! - `BROADCAST_ICON` - Path to the PNG attached inline to notification mail

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Plaza application configuration.
#[derive(Debug, Clone)]
pub struct PlazaConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Outbound mail configuration
    pub mail: MailConfig,
    /// Verification code validity window, in minutes
    pub otp_ttl_minutes: i64,
    /// Post retention window, in calendar months
    pub retention_months: u32,
    /// Post count at which an owner qualifies for an engagement nudge
    pub engagement_threshold: u64,
    /// Minimum gap between engagement nudges for one account, in hours
    pub engagement_renotify_hours: i64,
    /// PNG attached inline to notification mail, if present on disk
    pub broadcast_icon: Option<PathBuf>,
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct MailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl PlazaConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PLAZA_DATABASE_URL")?;
        let host = parse_field("PLAZA_HOST", &get_env_or_default("PLAZA_HOST", "127.0.0.1"))?;
        let port = parse_field("PLAZA_PORT", &get_env_or_default("PLAZA_PORT", "3000"))?;
        let mail = MailConfig::from_env()?;

        let otp_ttl_minutes = parse_field(
            "OTP_TTL_MINUTES",
            &get_env_or_default("OTP_TTL_MINUTES", "15"),
        )?;
        let retention_months = parse_field(
            "RETENTION_MONTHS",
            &get_env_or_default("RETENTION_MONTHS", "12"),
        )?;
        let engagement_threshold = parse_field(
            "ENGAGEMENT_THRESHOLD",
            &get_env_or_default("ENGAGEMENT_THRESHOLD", "2"),
        )?;
        let engagement_renotify_hours = parse_field(
            "ENGAGEMENT_RENOTIFY_HOURS",
            &get_env_or_default("ENGAGEMENT_RENOTIFY_HOURS", "8"),
        )?;
        let broadcast_icon = get_optional_env("BROADCAST_ICON").map(PathBuf::from);

        Ok(Self {
            database_url,
            host,
            port,
            mail,
            otp_ttl_minutes,
            retention_months,
            engagement_threshold,
            engagement_renotify_hours,
            broadcast_icon,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Verification code validity window.
    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.otp_ttl_minutes)
    }

    /// Minimum gap between engagement nudges for one account.
    #[must_use]
    pub fn engagement_renotify_after(&self) -> Duration {
        Duration::hours(self.engagement_renotify_hours)
    }
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: parse_field("SMTP_PORT", &get_env_or_default("SMTP_PORT", "587"))?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("MAIL_FROM")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a value, attributing failures to the named variable.
fn parse_field<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
