use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the sagebridge binary.
#[derive(Debug, Parser)]
#[command(
    name = "sagebridge",
    version,
    about = "Sage ERP inventory cache and product API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SAGEBRIDGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP services and the nightly inventory refresh.
    Serve(Box<ServeArgs>),
    /// Run a single inventory refresh cycle and exit.
    Sync(SyncArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: SyncOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SourceOverrides {
    /// Override the inventory source kind (static|http).
    #[arg(long = "source-kind", value_name = "KIND")]
    pub source_kind: Option<String>,

    /// Override the ERP gateway base URL.
    #[arg(long = "source-base-url", value_name = "URL")]
    pub source_base_url: Option<String>,

    /// Override the JSON catalog used by the static source.
    #[arg(long = "source-catalog-path", value_name = "PATH")]
    pub source_catalog_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncOverrides {
    #[command(flatten)]
    pub source: SourceOverrides,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the insert batch size.
    #[arg(long = "inventory-batch-size", value_name = "ROWS", allow_negative_numbers = true)]
    pub batch_size: Option<i64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub sync: SyncOverrides,

    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the nightly refresh time (HH:MM, UTC).
    #[arg(long = "inventory-sync-time", value_name = "HH:MM")]
    pub sync_time_utc: Option<String>,

    /// Override the staleness threshold; 0 disables the check.
    #[arg(long = "inventory-stale-after-seconds", value_name = "SECONDS")]
    pub stale_after_seconds: Option<u64>,

    /// Refresh immediately at startup when the cache is empty.
    #[arg(
        long = "inventory-sync-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sync_on_startup: Option<bool>,
}
