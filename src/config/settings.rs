//! Application settings
//!
//! Loaded from an optional `config.toml`, then `DATEIDEEN__SECTION__KEY`
//! environment variables. `DATABASE_URL` overrides `database.url` so the
//! sqlx tooling and the server agree on the connection string.

use std::env;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    pub app: AppConfig,
    pub sweeps: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma separated list of allowed browser origins.
    pub cors_allowed_origins: String,
    /// Enables HSTS; only meaningful behind TLS.
    pub production: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider that issues access tokens.
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub from: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prefix for links embedded in outgoing email.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    pub survey_interval_secs: u64,
    pub refund_interval_secs: u64,
    pub survey_lookback_minutes: i64,
    pub refund_lookback_days: i64,
    /// How long a `refund_in_progress` claim holds before another sweep may retake it.
    pub refund_claim_ttl_secs: i64,
    pub platform_fee_percent: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_allowed_origins: "http://localhost:3000,http://localhost:5173".to_string(),
            production: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Postgres,
            url: "postgres://localhost/dateideen".to_string(),
            max_connections: 5,
            run_migrations: true,
        }
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: "https://api.stripe.com".to_string(),
            timeout_secs: 15,
            webhook_tolerance_secs: 300,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from: "no-reply@dateideen.app".to_string(),
            api_base: "https://api.resend.com".to_string(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            survey_interval_secs: 600,
            refund_interval_secs: 3600,
            survey_lookback_minutes: 120,
            refund_lookback_days: 7,
            refund_claim_ttl_secs: 900,
            platform_fee_percent: dec!(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,dateideen_server=debug".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("DATEIDEEN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must be set".to_string()));
        }
        if self.sweeps.survey_interval_secs == 0 || self.sweeps.refund_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep intervals must be greater than zero".to_string(),
            ));
        }
        check_window(
            "sweeps.survey_lookback_minutes",
            self.sweeps.survey_lookback_minutes,
            MAX_SURVEY_LOOKBACK_MINUTES,
        )?;
        check_window(
            "sweeps.refund_lookback_days",
            self.sweeps.refund_lookback_days,
            MAX_REFUND_LOOKBACK_DAYS,
        )?;
        check_window(
            "sweeps.refund_claim_ttl_secs",
            self.sweeps.refund_claim_ttl_secs,
            MAX_REFUND_CLAIM_TTL_SECS,
        )?;
        let fee = self.sweeps.platform_fee_percent;
        if fee < Decimal::ZERO || fee > dec!(100) {
            return Err(ConfigError::Invalid(format!(
                "sweeps.platform_fee_percent must be within 0..=100, got {fee}"
            )));
        }
        if self.database.backend == DatabaseBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Invalid("database.url must be set".to_string()));
        }
        Ok(())
    }

    /// Secret key with blank values treated as absent.
    pub fn stripe_secret_key(&self) -> Option<&str> {
        non_blank(self.stripe.secret_key.as_deref())
    }

    pub fn stripe_webhook_secret(&self) -> Option<&str> {
        non_blank(self.stripe.webhook_secret.as_deref())
    }

    pub fn resend_api_key(&self) -> Option<&str> {
        non_blank(self.email.resend_api_key.as_deref())
    }
}

const MAX_SURVEY_LOOKBACK_MINUTES: i64 = 7 * 24 * 60;
const MAX_REFUND_LOOKBACK_DAYS: i64 = 365;
const MAX_REFUND_CLAIM_TTL_SECS: i64 = 24 * 60 * 60;

fn check_window(name: &str, value: i64, max: i64) -> Result<(), ConfigError> {
    if !(1..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be within 1..={max}, got {value}"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
