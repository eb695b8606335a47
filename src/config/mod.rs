//! Configuration layer: typed settings with layered precedence (file → env → CLI).
//!
//! Listener and logging settings are validated strictly. CDN settings are
//! resolved leniently: a missing or unreadable value falls back to
//! zero/disabled and is recorded in [`Settings::fallbacks`] so it can be
//! logged once telemetry is up.

mod cli;

use std::{fmt, net::SocketAddr, num::NonZeroU32, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    CliArgs, Command, LoggingOverrides, PurgeArgs, ResolveArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cachepilot";
const ENV_PREFIX: &str = "CACHEPILOT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FASTLY_API_BASE: &str = "https://api.fastly.com/";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub fastly: FastlySettings,
    pub fallbacks: Vec<Fallback>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub hook_token: Option<String>,
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
pub struct FastlySettings {
    pub api_base: Url,
    pub service_id: Option<String>,
    pub api_key: Option<String>,
    /// Default max-age in seconds; non-positive disables cache headers.
    pub max_age: i32,
    pub stale_while_revalidate: Option<NonZeroU32>,
    pub purge_all_on_publish: bool,
    pub disable_affinity_cookie: bool,
    pub purge_mode: PurgeMode,
}

impl Default for FastlySettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            service_id: None,
            api_key: None,
            max_age: 0,
            stale_while_revalidate: None,
            purge_all_on_publish: false,
            disable_affinity_cookie: false,
            purge_mode: PurgeMode::Await,
        }
    }
}

/// How the publish path relates to the outbound purge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeMode {
    /// The publish handler waits until the purge completes or fails.
    Await,
    /// The purge is spawned and the publish handler returns immediately.
    Detached,
}

impl FromStr for PurgeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "await" => Ok(Self::Await),
            "detached" => Ok(Self::Detached),
            other => Err(format!("unknown purge mode `{other}`")),
        }
    }
}

/// A CDN setting that could not be read and fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub key: &'static str,
    pub reason: String,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ignored: {}", self.key, self.reason)
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
        Some(Command::Purge(args)) => raw.apply_purge_overrides(args),
        Some(Command::Resolve(args)) => raw.apply_logging_overrides(&args.logging),
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
    fastly: RawFastlySettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(token) = overrides.hook_token.as_ref() {
            self.server.hook_token = Some(token.clone());
        }

        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_purge_overrides(&mut self, args: &PurgeArgs) {
        if let Some(service_id) = args.service_id.as_ref() {
            self.fastly.service_id = Some(service_id.clone());
        }

        self.apply_logging_overrides(&args.logging);
    }

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
        let RawSettings {
            server,
            logging,
            fastly,
        } = raw;

        let mut fallbacks = Vec::new();
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let fastly = build_fastly_settings(fastly, &mut fallbacks)?;

        Ok(Self {
            server,
            logging,
            fastly,
            fallbacks,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings {
        addr,
        hook_token: non_empty(server.hook_token),
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

fn build_fastly_settings(
    fastly: RawFastlySettings,
    fallbacks: &mut Vec<Fallback>,
) -> Result<FastlySettings, LoadError> {
    let api_base = match non_empty(fastly.api_base) {
        Some(value) => parse_api_base(&value)
            .map_err(|reason| LoadError::invalid("fastly.api_base", reason))?,
        None => default_api_base(),
    };

    let max_age = lenient_i32("fastly.max_age", fastly.max_age, fallbacks).unwrap_or(0);
    let stale_while_revalidate = lenient_i32(
        "fastly.stale_while_revalidate",
        fastly.stale_while_revalidate,
        fallbacks,
    )
    .and_then(|seconds| u32::try_from(seconds).ok())
    .and_then(NonZeroU32::new);

    let purge_all_on_publish = lenient_bool(
        "fastly.purge_all_on_publish",
        fastly.purge_all_on_publish,
        fallbacks,
    );
    let disable_affinity_cookie = lenient_bool(
        "fastly.disable_affinity_cookie",
        fastly.disable_affinity_cookie,
        fallbacks,
    );

    let purge_mode = match non_empty(fastly.purge_mode) {
        Some(value) => value.parse().unwrap_or_else(|reason| {
            fallbacks.push(Fallback {
                key: "fastly.purge_mode",
                reason,
            });
            PurgeMode::Await
        }),
        None => PurgeMode::Await,
    };

    Ok(FastlySettings {
        api_base,
        service_id: non_empty(fastly.service_id),
        api_key: non_empty(fastly.api_key),
        max_age,
        stale_while_revalidate,
        purge_all_on_publish,
        disable_affinity_cookie,
        purge_mode,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    hook_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

/// CDN keys are read as text so that malformed values degrade instead of
/// failing deserialization.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFastlySettings {
    api_base: Option<String>,
    service_id: Option<String>,
    api_key: Option<String>,
    max_age: Option<String>,
    stale_while_revalidate: Option<String>,
    purge_all_on_publish: Option<String>,
    disable_affinity_cookie: Option<String>,
    purge_mode: Option<String>,
}

fn default_api_base() -> Url {
    Url::parse(DEFAULT_FASTLY_API_BASE).expect("default Fastly API base is a valid URL")
}

/// Parse the API base, forcing a trailing slash so relative joins keep the path.
fn parse_api_base(value: &str) -> Result<Url, String> {
    let mut url = Url::parse(value).map_err(|err| format!("invalid URL `{value}`: {err}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("`{value}` cannot be used as a base URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn lenient_i32(
    key: &'static str,
    value: Option<String>,
    fallbacks: &mut Vec<Fallback>,
) -> Option<i32> {
    let value = non_empty(value)?;
    match value.parse::<i32>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            fallbacks.push(Fallback {
                key,
                reason: format!("`{value}` is not an integer: {err}"),
            });
            None
        }
    }
}

fn lenient_bool(key: &'static str, value: Option<String>, fallbacks: &mut Vec<Fallback>) -> bool {
    let Some(value) = non_empty(value) else {
        return false;
    };
    if value.eq_ignore_ascii_case("true") {
        true
    } else if value.eq_ignore_ascii_case("false") {
        false
    } else {
        fallbacks.push(Fallback {
            key,
            reason: format!("`{value}` is not a boolean"),
        });
        false
    }
}
