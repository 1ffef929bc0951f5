//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::collections::BTreeMap;
use std::str::FromStr;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, DependencyTable, InvalidKeyError};

pub use cli::{CliArgs, Command, DeriveArgs, LoggingOverrides, ResolveArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "querykey";
const ENV_PREFIX: &str = "QUERYKEY";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub dependencies: DependencyTable,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("invalid dependency table: {0}")]
    Dependency(#[from] InvalidKeyError),
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_environment(cli, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn load_with_environment(cli: &CliArgs, environment: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment);

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_logging_overrides(&cli.logging);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    dependencies: BTreeMap<String, RawDependents>,
}

/// Dependent kinds as a list, or as a comma-separated string from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawDependents {
    List(Vec<String>),
    Joined(String),
}

impl RawDependents {
    fn into_kinds(self) -> Vec<String> {
        match self {
            RawDependents::List(kinds) => kinds,
            RawDependents::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    ttl_ms: Option<u64>,
    consume_batch_limit: Option<usize>,
    event_queue_limit: Option<usize>,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
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
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            cache: build_cache_config(raw.cache)?,
            dependencies: DependencyTable::from_raw(
                raw.dependencies
                    .into_iter()
                    .map(|(kind, dependents)| (kind, dependents.into_kinds())),
            )?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_config(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let defaults = CacheConfig::default();

    let capacity = cache.capacity.unwrap_or(defaults.capacity);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }
    let consume_batch_limit = cache
        .consume_batch_limit
        .unwrap_or(defaults.consume_batch_limit);
    if consume_batch_limit == 0 {
        return Err(LoadError::invalid(
            "cache.consume_batch_limit",
            "must be greater than zero",
        ));
    }
    let event_queue_limit = cache
        .event_queue_limit
        .unwrap_or(defaults.event_queue_limit);
    if event_queue_limit == 0 {
        return Err(LoadError::invalid(
            "cache.event_queue_limit",
            "must be greater than zero",
        ));
    }

    Ok(CacheConfig {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        capacity,
        ttl_ms: cache.ttl_ms.unwrap_or(defaults.ttl_ms),
        consume_batch_limit,
        event_queue_limit,
    })
}
