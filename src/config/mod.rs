//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use time::{Time, macros::format_description};
use tracing::level_filters::LevelFilter;

use crate::application::{
    options::{DEFAULT_BATCH_SIZE, DEFAULT_REFRESH_TIMEOUT, DEFAULT_STALE_AFTER, DEFAULT_SYNC_TIME_UTC},
    quotes::DEFAULT_TAX_RATE,
};

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides, SourceOverrides, SyncArgs, SyncOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sagebridge";
const ENV_PREFIX: &str = "SAGEBRIDGE";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8080;
const DEFAULT_ADMIN_PORT: u16 = 8081;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 120;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub inventory_cache: InventoryCacheSettings,
    pub source: SourceSettings,
    pub quotes: QuoteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` keeps the cache in process memory.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct InventoryCacheSettings {
    pub sync_time_utc: Time,
    /// Rows per insert chunk; zero or negative means one chunk.
    pub batch_size: i64,
    pub stale_after: Option<time::Duration>,
    pub refresh_timeout: Option<Duration>,
    pub sync_on_startup: bool,
}

#[derive(Debug, Clone)]
pub enum SourceSettings {
    Static { catalog_path: Option<PathBuf> },
    Http(HttpSourceSettings),
}

#[derive(Debug, Clone)]
pub struct HttpSourceSettings {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub tax_rate: Decimal,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
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
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Sync(args)) => raw.apply_sync_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

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
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    inventory_cache: RawInventoryCacheSettings,
    source: RawSourceSettings,
    quotes: RawQuoteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(value) = overrides.sync_time_utc.as_ref() {
            self.inventory_cache.sync_time_utc = Some(value.clone());
        }
        if let Some(seconds) = overrides.stale_after_seconds {
            self.inventory_cache.stale_after_seconds = Some(seconds);
        }
        if let Some(flag) = overrides.sync_on_startup {
            self.inventory_cache.sync_on_startup = Some(flag);
        }

        self.apply_sync_overrides(&overrides.sync);
    }

    fn apply_sync_overrides(&mut self, overrides: &SyncOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(size) = overrides.batch_size {
            self.inventory_cache.batch_size = Some(size);
        }

        self.apply_source_overrides(&overrides.source);
    }

    fn apply_source_overrides(&mut self, overrides: &SourceOverrides) {
        if let Some(kind) = overrides.source_kind.as_ref() {
            self.source.kind = Some(kind.clone());
        }
        if let Some(url) = overrides.source_base_url.as_ref() {
            self.source.base_url = Some(url.clone());
        }
        if let Some(path) = overrides.source_catalog_path.as_ref() {
            self.source.catalog_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            inventory_cache,
            source,
            quotes,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            inventory_cache: build_inventory_cache_settings(inventory_cache)?,
            source: build_source_settings(source)?,
            quotes: build_quote_settings(quotes)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_inventory_cache_settings(
    cache: RawInventoryCacheSettings,
) -> Result<InventoryCacheSettings, LoadError> {
    let sync_time_utc = match non_blank(cache.sync_time_utc) {
        Some(value) => parse_sync_time(&value)
            .map_err(|reason| LoadError::invalid("inventory_cache.sync_time_utc", reason))?,
        None => DEFAULT_SYNC_TIME_UTC,
    };

    let batch_size = cache.batch_size.unwrap_or(DEFAULT_BATCH_SIZE as i64);

    let stale_after = match cache.stale_after_seconds {
        None => Some(DEFAULT_STALE_AFTER),
        Some(0) => None,
        Some(seconds) => {
            let seconds = i64::try_from(seconds).map_err(|_| {
                LoadError::invalid("inventory_cache.stale_after_seconds", "value is too large")
            })?;
            Some(time::Duration::seconds(seconds))
        }
    };

    let refresh_timeout = match cache.refresh_timeout_seconds {
        None => Some(DEFAULT_REFRESH_TIMEOUT),
        Some(0) => None,
        Some(seconds) => Some(Duration::from_secs(seconds)),
    };

    Ok(InventoryCacheSettings {
        sync_time_utc,
        batch_size,
        stale_after,
        refresh_timeout,
        sync_on_startup: cache.sync_on_startup.unwrap_or(false),
    })
}

fn build_source_settings(source: RawSourceSettings) -> Result<SourceSettings, LoadError> {
    let kind = non_blank(source.kind).unwrap_or_else(|| "static".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "static" => Ok(SourceSettings::Static {
            catalog_path: source
                .catalog_path
                .filter(|path| !path.as_os_str().is_empty()),
        }),
        "http" => {
            let base_url = non_blank(source.base_url).ok_or_else(|| {
                LoadError::invalid("source.base_url", "required when source.kind is `http`")
            })?;
            let base_url = Url::parse(&base_url)
                .map_err(|err| LoadError::invalid("source.base_url", err.to_string()))?;
            if !matches!(base_url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "source.base_url",
                    "scheme must be http or https",
                ));
            }

            let timeout_secs = source.timeout_seconds.unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS);
            if timeout_secs == 0 {
                return Err(LoadError::invalid(
                    "source.timeout_seconds",
                    "must be greater than zero",
                ));
            }

            Ok(SourceSettings::Http(HttpSourceSettings {
                base_url,
                api_token: non_blank(source.api_token),
                timeout: Duration::from_secs(timeout_secs),
            }))
        }
        other => Err(LoadError::invalid(
            "source.kind",
            format!("unknown source kind `{other}`, expected static or http"),
        )),
    }
}

fn build_quote_settings(quotes: RawQuoteSettings) -> Result<QuoteSettings, LoadError> {
    let tax_rate = quotes.tax_rate.unwrap_or(DEFAULT_TAX_RATE);
    if tax_rate.is_sign_negative() || tax_rate > Decimal::ONE {
        return Err(LoadError::invalid(
            "quotes.tax_rate",
            "must be between 0 and 1",
        ));
    }

    Ok(QuoteSettings { tax_rate })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInventoryCacheSettings {
    sync_time_utc: Option<String>,
    batch_size: Option<i64>,
    stale_after_seconds: Option<u64>,
    refresh_timeout_seconds: Option<u64>,
    sync_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSourceSettings {
    kind: Option<String>,
    base_url: Option<String>,
    api_token: Option<String>,
    timeout_seconds: Option<u64>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuoteSettings {
    tax_rate: Option<Decimal>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_sync_time(value: &str) -> Result<Time, String> {
    Time::parse(value, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(value, format_description!("[hour]:[minute]:[second]")))
        .map_err(|err| format!("expected HH:MM or HH:MM:SS, got `{value}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
