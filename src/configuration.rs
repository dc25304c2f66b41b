use config::ConfigError;

use crate::error::{self, AppError};

/// Minimum HS256 secret length in bytes
const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// bcrypt cost factor
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
    /// Seconds between sweeps of expired refresh tokens
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
    /// Serve from the in-memory store instead of Postgres
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64,   // seconds, 900 = 15 minutes
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64,  // seconds, 604800 = 7 days
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Clock-skew allowance when checking `exp`, in seconds
    #[serde(default)]
    pub leeway: u64,
}

impl JwtSettings {
    /// Rejects settings the token codec cannot safely run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(error::ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            ))
            .into());
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(error::ConfigError::InvalidValue(
                "jwt token lifetimes must be positive".to_string(),
            )
            .into());
        }
        if self.issuer.is_empty() {
            return Err(error::ConfigError::MissingRequired("jwt.issuer".to_string()).into());
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_purge_interval() -> u64 {
    3600
}

fn default_access_expiry() -> i64 {
    15 * 60
}

fn default_refresh_expiry() -> i64 {
    7 * 24 * 60 * 60
}

fn default_issuer() -> String {
    "notes_auth".to_string()
}

/// Loads `configuration.{yaml,toml,json}` if present, then applies
/// `APP_<SECTION>__<KEY>` environment overrides (e.g. `APP_JWT__SECRET`).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
