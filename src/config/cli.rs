use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the cachepilot binary.
#[derive(Debug, Parser)]
#[command(
    name = "cachepilot",
    version,
    about = "CDN cache-control and purge-on-publish integration"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CACHEPILOT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the publish webhook listener.
    Serve(Box<ServeArgs>),
    /// Purge the whole CDN service cache once and exit.
    Purge(PurgeArgs),
    /// Print the cache headers the current policy would emit.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the bearer token required by the publish webhook.
    #[arg(long = "hook-token", env = "CACHEPILOT_HOOK_TOKEN", value_name = "TOKEN")]
    pub hook_token: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the CDN service id to purge.
    #[arg(long = "service-id", value_name = "ID")]
    pub service_id: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Simulate a per-content max-age override, in seconds.
    #[arg(long = "max-age-override", value_name = "SECONDS", allow_hyphen_values = true)]
    pub max_age_override: Option<i32>,
}
