//! # ms-config
//!
//! Settings for the modstate binary. Sources, lowest precedence first:
//! an optional `modstate.toml`, then process environment (after `.env` has
//! been loaded with [`load_env_file`]). Keys are the legacy flat environment
//! names, e.g. `POSTGRES_HOST` or `PUSH_PORT`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use ms_freshness::ExpiryPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "modstate";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug)]
pub struct Settings {
    pub http: HttpSettings,
    pub push: PushSettings,
    pub postgres: PostgresSettings,
    pub redis: RedisSettings,
    pub catalog: CatalogSettings,
    pub freshness: FreshnessSettings,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub port: u16,
    /// Mounted in front of every public route, e.g. `/api`
    pub api_prefix: String,
}

#[derive(Debug, Clone)]
pub struct PushSettings {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub user: String,
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
}

impl RedisSettings {
    /// Connection URL for database 0; contains the password.
    pub fn url(&self) -> SecretString {
        let url = match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/0",
                password.expose_secret(),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}/0", self.host, self.port),
        };
        SecretString::from(url)
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Directory holding the SQLite catalog files
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FreshnessSettings {
    pub reconcile_interval: Duration,
    pub reconcile_timeout: Duration,
    pub nuke_expiry: Duration,
    pub expiry_policy: ExpiryPolicy,
}

/// Flat shape of the sources.
#[derive(Debug, Deserialize)]
struct RawSettings {
    port: u16,
    #[serde(default)]
    api_prefix: String,
    #[serde(default = "default_push_port")]
    push_port: u16,

    postgres_user: String,
    postgres_password: String,
    postgres_host: String,
    postgres_port: u16,
    postgres_db: String,

    redis_host: String,
    redis_port: u16,
    #[serde(default)]
    redis_password: Option<String>,

    #[serde(default = "default_catalog_dir")]
    catalog_dir: PathBuf,

    #[serde(default = "default_reconcile_interval_secs")]
    reconcile_interval_secs: u64,
    #[serde(default = "default_reconcile_timeout_secs")]
    reconcile_timeout_secs: u64,
    #[serde(default = "default_nuke_expiry_secs")]
    nuke_expiry_secs: u64,
    #[serde(default)]
    nuke_expiry_policy: ExpiryPolicy,
}

fn default_push_port() -> u16 {
    6413
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("./db")
}

fn default_reconcile_interval_secs() -> u64 {
    15
}

fn default_reconcile_timeout_secs() -> u64 {
    10
}

fn default_nuke_expiry_secs() -> u64 {
    300
}

impl TryFrom<RawSettings> for Settings {
    type Error = SettingsError;

    fn try_from(raw: RawSettings) -> Result<Self> {
        if raw.reconcile_interval_secs == 0 {
            return Err(SettingsError::Invalid(
                "RECONCILE_INTERVAL_SECS must be greater than zero".into(),
            ));
        }
        if raw.reconcile_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "RECONCILE_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }

        Ok(Settings {
            http: HttpSettings {
                port: raw.port,
                api_prefix: raw.api_prefix.trim_end_matches('/').to_string(),
            },
            push: PushSettings {
                port: raw.push_port,
            },
            postgres: PostgresSettings {
                user: raw.postgres_user,
                password: SecretString::from(raw.postgres_password),
                host: raw.postgres_host,
                port: raw.postgres_port,
                database: raw.postgres_db,
            },
            redis: RedisSettings {
                host: raw.redis_host,
                port: raw.redis_port,
                password: raw
                    .redis_password
                    .filter(|p| !p.is_empty())
                    .map(SecretString::from),
            },
            catalog: CatalogSettings {
                dir: raw.catalog_dir,
            },
            freshness: FreshnessSettings {
                reconcile_interval: Duration::from_secs(raw.reconcile_interval_secs),
                reconcile_timeout: Duration::from_secs(raw.reconcile_timeout_secs),
                nuke_expiry: Duration::from_secs(raw.nuke_expiry_secs),
                expiry_policy: raw.nuke_expiry_policy,
            },
        })
    }
}

/// What happened to the `.env` file. Loading runs before logging is set up,
/// so the outcome is returned and logged by the caller.
#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    Missing,
    Invalid(String),
}

impl EnvFile {
    pub fn log(&self) {
        match self {
            EnvFile::Loaded(path) => tracing::info!(path = %path.display(), "loaded environment file"),
            EnvFile::Missing => tracing::debug!("no .env file found"),
            EnvFile::Invalid(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
        }
    }
}

fn env_file_outcome(result: dotenvy::Result<PathBuf>) -> EnvFile {
    match result {
        Ok(path) => EnvFile::Loaded(path),
        Err(err) if err.not_found() => EnvFile::Missing,
        Err(err) => EnvFile::Invalid(err.to_string()),
    }
}

/// Loads the nearest `.env` into the process environment.
pub fn load_env_file() -> EnvFile {
    env_file_outcome(dotenvy::dotenv())
}

/// Loads a specific env file into the process environment.
pub fn load_env_file_from(path: &Path) -> EnvFile {
    env_file_outcome(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

impl Settings {
    /// Reads settings from the default sources. Call [`load_env_file`]
    /// first so `.env` values are visible.
    pub fn load() -> Result<Self> {
        Self::load_from(Environment::default().try_parsing(true))
    }

    /// Reads settings with `env` standing in for the process environment.
    pub fn load_from(env: Environment) -> Result<Self> {
        let raw: RawSettings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        raw.try_into()
    }
}
