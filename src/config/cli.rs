use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

use crate::domain::convert::TypeTag;
use crate::domain::entities::ConfigValueType;

/// Command-line arguments for the confreader binary.
#[derive(Debug, Parser)]
#[command(name = "confreader", version, about = "Tiered configuration reader")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CONFREADER_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ReaderOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Read one key through every tier.
    Get(GetArgs),
    /// Print the current snapshot.
    Dump,
    /// Keep the reader running and report each refresh.
    Watch(WatchArgs),
    /// Create or update an entry in the durable store.
    Set(SetArgs),
    /// Mark an entry inactive in the durable store.
    Deactivate(KeyArgs),
    /// List application names present in the durable store.
    Apps,
    /// Remove this application's keys from the distributed cache.
    Purge,
    /// Apply database migrations.
    Migrate,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    pub key: String,

    /// Type to convert the stored value to.
    #[arg(long = "as", value_enum, default_value_t = ReadAs::String)]
    pub read_as: ReadAs,

    /// Printed instead of failing when the key does not exist.
    #[arg(long, value_name = "VALUE")]
    pub default: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Keys to print after every refresh; all keys when omitted.
    #[arg(long = "key", value_name = "KEY")]
    pub keys: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SetArgs {
    pub key: String,
    pub value: String,

    /// Declared type, checked against the value before writing.
    #[arg(long = "type", value_name = "TYPE", default_value = "string")]
    pub value_type: ConfigValueType,
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadAs {
    String,
    Int,
    Long,
    Double,
    Decimal,
    Bool,
    Timestamp,
    Json,
}

impl ReadAs {
    pub fn type_tag(self) -> TypeTag {
        match self {
            Self::String => TypeTag::String,
            Self::Int => TypeTag::Int32,
            Self::Long => TypeTag::Int64,
            Self::Double => TypeTag::Double,
            Self::Decimal => TypeTag::Decimal,
            Self::Bool => TypeTag::Boolean,
            Self::Timestamp => TypeTag::Timestamp,
            Self::Json => TypeTag::Structured("json"),
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReaderOverrides {
    /// Override the application whose entries are read.
    #[arg(
        long = "application-name",
        short = 'a',
        value_name = "NAME",
        global = true
    )]
    pub application_name: Option<String>,

    /// Override the Postgres connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the background refresh interval.
    #[arg(long = "refresh-interval-seconds", value_name = "SECONDS", global = true)]
    pub refresh_interval_seconds: Option<u64>,

    /// Override the distributed cache entry lifetime.
    #[arg(long = "redis-ttl-minutes", value_name = "MINUTES", global = true)]
    pub distributed_cache_ttl_minutes: Option<u64>,

    /// Override the Postgres pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub max_connections: Option<u32>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}
