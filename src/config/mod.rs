//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::entities::validate_name;
use crate::domain::error::DomainError;

mod cli;

pub use cli::{
    CliArgs, Command, GetArgs, KeyArgs, ReadAs, ReaderOverrides, SetArgs, WatchArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "confreader";
const ENV_PREFIX: &str = "CONFREADER";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_DISTRIBUTED_CACHE_TTL_MINUTES: u64 = 5;
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub reader: ReaderSettings,
    pub logging: LoggingSettings,
}

/// Reader settings as resolved from files, environment and CLI. Identity
/// fields stay optional so commands that only touch the database can run
/// without an application name.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub application_name: Option<String>,
    pub durable_store_connection: Option<String>,
    pub distributed_cache_connection: Option<String>,
    pub refresh_interval: Duration,
    pub distributed_cache_ttl: Duration,
    pub enable_logging: bool,
    pub max_connections: NonZeroU32,
}

impl ReaderSettings {
    pub fn require_application_name(&self) -> Result<&str, LoadError> {
        self.application_name
            .as_deref()
            .ok_or_else(|| LoadError::invalid("reader.application_name", "must be set"))
    }

    pub fn require_durable_store_connection(&self) -> Result<&str, LoadError> {
        self.durable_store_connection
            .as_deref()
            .ok_or_else(|| LoadError::invalid("reader.durable_store_connection", "must be set"))
    }

    /// Complete, validated reader options.
    pub fn reader_options(&self) -> Result<ReaderOptions, LoadError> {
        let mut options = ReaderOptions::new(
            self.require_application_name()?,
            self.require_durable_store_connection()?,
        );
        options.distributed_cache_connection = self.distributed_cache_connection.clone();
        options.refresh_interval = self.refresh_interval;
        options.distributed_cache_ttl = self.distributed_cache_ttl;
        options.enable_logging = self.enable_logging;
        options.max_connections = self.max_connections;
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Everything needed to construct a [`ConfigReader`](crate::cache::ConfigReader).
#[derive(Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    pub application_name: String,
    pub durable_store_connection: String,
    pub distributed_cache_connection: Option<String>,
    pub refresh_interval: Duration,
    pub distributed_cache_ttl: Duration,
    /// Install a console subscriber when the host has none.
    pub enable_logging: bool,
    pub max_connections: NonZeroU32,
}

impl std::fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("application_name", &self.application_name)
            .field("durable_store_connection", &"<redacted>")
            .field(
                "distributed_cache_connection",
                &self.distributed_cache_connection.as_ref().map(|_| "<redacted>"),
            )
            .field("refresh_interval", &self.refresh_interval)
            .field("distributed_cache_ttl", &self.distributed_cache_ttl)
            .field("enable_logging", &self.enable_logging)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl ReaderOptions {
    pub fn new(
        application_name: impl Into<String>,
        durable_store_connection: impl Into<String>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            durable_store_connection: durable_store_connection.into(),
            distributed_cache_connection: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            distributed_cache_ttl: Duration::from_secs(DEFAULT_DISTRIBUTED_CACHE_TTL_MINUTES * 60),
            enable_logging: false,
            max_connections: NonZeroU32::new(DEFAULT_MAX_CONNECTIONS).unwrap_or(NonZeroU32::MIN),
        }
    }

    pub fn with_distributed_cache(mut self, connection: impl Into<String>) -> Self {
        self.distributed_cache_connection = Some(connection.into());
        self
    }

    pub fn with_refresh_interval_seconds(mut self, seconds: u64) -> Self {
        self.refresh_interval = Duration::from_secs(seconds);
        self
    }

    pub fn with_distributed_cache_ttl_minutes(mut self, minutes: u64) -> Self {
        self.distributed_cache_ttl = Duration::from_secs(minutes.saturating_mul(60));
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn with_max_connections(mut self, max_connections: NonZeroU32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Reject options a reader cannot run with.
    pub fn validate(&self) -> Result<(), LoadError> {
        validate_name("reader.application_name", &self.application_name).map_err(
            |DomainError::Validation { field, message }| LoadError::invalid(field, message),
        )?;
        if self.durable_store_connection.trim().is_empty() {
            return Err(LoadError::invalid(
                "reader.durable_store_connection",
                "must be set",
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(LoadError::invalid(
                "reader.refresh_interval_seconds",
                "must be greater than zero",
            ));
        }
        if self.distributed_cache_ttl.is_zero() {
            return Err(LoadError::invalid(
                "reader.distributed_cache_ttl_minutes",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    reader: RawReaderSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ReaderOverrides) {
        if let Some(name) = overrides.application_name.as_ref() {
            self.reader.application_name = Some(name.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.reader.durable_store_connection = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.reader.distributed_cache_connection = Some(url.clone());
        }
        if let Some(seconds) = overrides.refresh_interval_seconds {
            self.reader.refresh_interval_seconds = Some(seconds);
        }
        if let Some(minutes) = overrides.distributed_cache_ttl_minutes {
            self.reader.distributed_cache_ttl_minutes = Some(minutes);
        }
        if let Some(count) = overrides.max_connections {
            self.reader.max_connections = Some(count);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { reader, logging } = raw;

        let reader = build_reader_settings(reader)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self { reader, logging })
    }
}

fn build_reader_settings(reader: RawReaderSettings) -> Result<ReaderSettings, LoadError> {
    let application_name = non_blank(reader.application_name);
    if let Some(name) = application_name.as_deref() {
        validate_name("reader.application_name", name).map_err(
            |DomainError::Validation { field, message }| LoadError::invalid(field, message),
        )?;
    }

    let refresh_secs = reader
        .refresh_interval_seconds
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
    if refresh_secs == 0 {
        return Err(LoadError::invalid(
            "reader.refresh_interval_seconds",
            "must be greater than zero",
        ));
    }

    let ttl_minutes = reader
        .distributed_cache_ttl_minutes
        .unwrap_or(DEFAULT_DISTRIBUTED_CACHE_TTL_MINUTES);
    if ttl_minutes == 0 {
        return Err(LoadError::invalid(
            "reader.distributed_cache_ttl_minutes",
            "must be greater than zero",
        ));
    }

    let max_connections = non_zero_u32(
        u64::from(reader.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)),
        "reader.max_connections",
    )?;

    Ok(ReaderSettings {
        application_name,
        durable_store_connection: non_blank(reader.durable_store_connection),
        distributed_cache_connection: non_blank(reader.distributed_cache_connection),
        refresh_interval: Duration::from_secs(refresh_secs),
        distributed_cache_ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)),
        enable_logging: reader.enable_logging.unwrap_or(false),
        max_connections,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReaderSettings {
    application_name: Option<String>,
    durable_store_connection: Option<String>,
    distributed_cache_connection: Option<String>,
    refresh_interval_seconds: Option<u64>,
    distributed_cache_ttl_minutes: Option<u64>,
    enable_logging: Option<bool>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32 = u32::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
