//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::types::{Priority, TargetKind};
use crate::warming::{
    StalenessThresholds,
    config::{
        DEFAULT_CONCURRENCY, DEFAULT_CRITICAL_CONCURRENCY, DEFAULT_DEPLOYMENT_CONCURRENCY,
        DEFAULT_HEALTH_WINDOW_EVENTS, DEFAULT_MAX_CONCURRENCY, DEFAULT_SMART_CONCURRENCY,
        DEFAULT_STALE_CRITICAL_SECS, DEFAULT_STALE_HIGH_SECS, DEFAULT_STALE_LOW_SECS,
        DEFAULT_STALE_NORMAL_SECS, DEFAULT_SUCCESS_RATE_FLOOR, DEFAULT_TIMEOUT_MS,
    },
};

pub use cli::{
    CliArgs, Command, CommonOverrides, ServeArgs, ServeOverrides, StrategyArg, TargetsArgs,
    WarmArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "prewarm";
const ENV_PREFIX: &str = "PREWARM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_LOG_CAPACITY: usize = 1000;
const DEFAULT_LOG_PATH: &str = "data/prewarm-events.jsonl";
const DEFAULT_SCHEDULER_CADENCE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub admin: AdminSettings,
    pub warming: WarmingSettings,
    pub log: EventLogSettings,
    pub scheduler: SchedulerSettings,
    pub targets: Vec<TargetSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployEnvironment {
    Production,
    Development,
}

impl DeployEnvironment {
    pub fn is_production(self) -> bool {
        matches!(self, DeployEnvironment::Production)
    }
}

#[derive(Clone)]
pub struct AdminSettings {
    /// Shared secret for the admin surface. `None` rejects every request.
    pub token: Option<String>,
    pub environment: DeployEnvironment,
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WarmingSettings {
    pub base_url: Option<Url>,
    pub default_concurrency: NonZeroUsize,
    pub max_concurrency: NonZeroUsize,
    pub critical_concurrency: NonZeroUsize,
    pub smart_concurrency: NonZeroUsize,
    pub deployment_concurrency: NonZeroUsize,
    pub timeout: Duration,
    pub staleness: StalenessThresholds,
    pub success_rate_floor: f64,
    pub health_window_events: NonZeroUsize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackend {
    Memory,
    Jsonl { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct EventLogSettings {
    pub backend: LogBackend,
    pub capacity: NonZeroUsize,
    /// Wrap the backend so failed appends land in memory instead of aborting runs.
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub cadence: Duration,
}

#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub id: String,
    pub kind: TargetKind,
    pub priority: Priority,
    pub url: Url,
    pub method: Method,
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    let serves_http = match cli.command.as_ref() {
        Some(Command::Serve(args)) => {
            raw.apply_serve_overrides(&args.overrides);
            true
        }
        Some(Command::Warm(args)) => {
            raw.apply_common_overrides(&args.overrides);
            false
        }
        Some(Command::Targets(args)) => {
            raw.apply_common_overrides(&args.overrides);
            false
        }
        None => {
            raw.apply_serve_overrides(&ServeOverrides::default());
            true
        }
    };

    let settings = Settings::from_raw(raw)?;
    if serves_http {
        settings.ensure_admin_token()?;
    }
    Ok(settings)
}

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
    admin: RawAdminSettings,
    warming: RawWarmingSettings,
    log: RawEventLogSettings,
    scheduler: RawSchedulerSettings,
    targets: Vec<RawTargetSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(token) = overrides.admin_token.as_ref() {
            self.admin.token = Some(token.clone());
        }
        if let Some(environment) = overrides.admin_environment.as_ref() {
            self.admin.environment = Some(environment.clone());
        }
        if let Some(enabled) = overrides.scheduler_enabled {
            self.scheduler.enabled = Some(enabled);
        }
        if let Some(cadence) = overrides.scheduler_cadence_seconds {
            self.scheduler.cadence_seconds = Some(cadence);
        }

        self.apply_common_overrides(&overrides.common);
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(base_url) = overrides.warming_base_url.as_ref() {
            self.warming.base_url = Some(base_url.clone());
        }
        if let Some(timeout) = overrides.warming_timeout_ms {
            self.warming.timeout_ms = Some(timeout);
        }
        if let Some(backend) = overrides.log_backend.as_ref() {
            self.log.backend = Some(backend.clone());
        }
        if let Some(path) = overrides.log_path.as_ref() {
            self.log.path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            admin,
            warming,
            log,
            scheduler,
            targets,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let admin = build_admin_settings(admin)?;
        let warming = build_warming_settings(warming)?;
        let log = build_event_log_settings(log)?;
        let scheduler = build_scheduler_settings(scheduler)?;
        let targets = build_target_settings(targets, warming.base_url.as_ref())?;

        Ok(Self {
            server,
            logging,
            admin,
            warming,
            log,
            scheduler,
            targets,
        })
    }

    /// The admin surface must not start in production without a secret.
    fn ensure_admin_token(&self) -> Result<(), LoadError> {
        if self.admin.environment.is_production() && self.admin.token.is_none() {
            return Err(LoadError::invalid(
                "admin.token",
                "must be set when admin.environment is `production`",
            ));
        }
        Ok(())
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
        addr,
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

fn build_admin_settings(admin: RawAdminSettings) -> Result<AdminSettings, LoadError> {
    let token = admin.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let environment = match admin.environment.as_deref().map(str::trim) {
        None | Some("production") => DeployEnvironment::Production,
        Some("development") => DeployEnvironment::Development,
        Some(other) => {
            return Err(LoadError::invalid(
                "admin.environment",
                format!("expected `production` or `development`, got `{other}`"),
            ));
        }
    };

    Ok(AdminSettings { token, environment })
}

fn build_warming_settings(warming: RawWarmingSettings) -> Result<WarmingSettings, LoadError> {
    let base_url = match warming.base_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(
            Url::parse(value)
                .map_err(|err| LoadError::invalid("warming.base_url", err.to_string()))?,
        ),
    };

    let max_concurrency = non_zero_usize(
        warming.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
        "warming.max_concurrency",
    )?;
    let default_concurrency = non_zero_usize(
        warming.default_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        "warming.default_concurrency",
    )?;
    let critical_concurrency = non_zero_usize(
        warming
            .critical_concurrency
            .unwrap_or(DEFAULT_CRITICAL_CONCURRENCY),
        "warming.critical_concurrency",
    )?;
    let smart_concurrency = non_zero_usize(
        warming.smart_concurrency.unwrap_or(DEFAULT_SMART_CONCURRENCY),
        "warming.smart_concurrency",
    )?;
    let deployment_concurrency = non_zero_usize(
        warming
            .deployment_concurrency
            .unwrap_or(DEFAULT_DEPLOYMENT_CONCURRENCY),
        "warming.deployment_concurrency",
    )?;

    let timeout_ms = warming.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "warming.timeout_ms",
            "must be greater than zero",
        ));
    }

    let staleness = StalenessThresholds {
        critical: positive_secs(
            warming
                .stale_critical_seconds
                .unwrap_or(DEFAULT_STALE_CRITICAL_SECS),
            "warming.stale_critical_seconds",
        )?,
        high: positive_secs(
            warming.stale_high_seconds.unwrap_or(DEFAULT_STALE_HIGH_SECS),
            "warming.stale_high_seconds",
        )?,
        normal: positive_secs(
            warming
                .stale_normal_seconds
                .unwrap_or(DEFAULT_STALE_NORMAL_SECS),
            "warming.stale_normal_seconds",
        )?,
        low: positive_secs(
            warming.stale_low_seconds.unwrap_or(DEFAULT_STALE_LOW_SECS),
            "warming.stale_low_seconds",
        )?,
    };

    let success_rate_floor = warming
        .success_rate_floor
        .unwrap_or(DEFAULT_SUCCESS_RATE_FLOOR);
    if !(0.0..=100.0).contains(&success_rate_floor) {
        return Err(LoadError::invalid(
            "warming.success_rate_floor",
            "must be a percentage between 0 and 100",
        ));
    }

    let health_window_events = non_zero_usize(
        warming
            .health_window_events
            .unwrap_or(DEFAULT_HEALTH_WINDOW_EVENTS),
        "warming.health_window_events",
    )?;

    Ok(WarmingSettings {
        base_url,
        default_concurrency,
        max_concurrency,
        critical_concurrency,
        smart_concurrency,
        deployment_concurrency,
        timeout: Duration::from_millis(timeout_ms),
        staleness,
        success_rate_floor,
        health_window_events,
    })
}

fn build_event_log_settings(log: RawEventLogSettings) -> Result<EventLogSettings, LoadError> {
    let capacity = non_zero_usize(
        log.capacity.unwrap_or(DEFAULT_LOG_CAPACITY),
        "log.capacity",
    )?;

    let backend = match log.backend.as_deref().map(str::trim) {
        None | Some("memory") => LogBackend::Memory,
        Some("jsonl") => {
            let path = log
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
            if path.as_os_str().is_empty() {
                return Err(LoadError::invalid("log.path", "path must not be empty"));
            }
            LogBackend::Jsonl { path }
        }
        Some(other) => {
            return Err(LoadError::invalid(
                "log.backend",
                format!("expected `memory` or `jsonl`, got `{other}`"),
            ));
        }
    };

    Ok(EventLogSettings {
        backend,
        capacity,
        fallback: log.fallback.unwrap_or(true),
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let cadence_seconds = scheduler
        .cadence_seconds
        .unwrap_or(DEFAULT_SCHEDULER_CADENCE_SECS);
    if cadence_seconds == 0 {
        return Err(LoadError::invalid(
            "scheduler.cadence_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SchedulerSettings {
        enabled: scheduler.enabled.unwrap_or(false),
        cadence: Duration::from_secs(cadence_seconds),
    })
}

fn build_target_settings(
    targets: Vec<RawTargetSettings>,
    base_url: Option<&Url>,
) -> Result<Vec<TargetSettings>, LoadError> {
    targets
        .into_iter()
        .map(|raw| build_target(raw, base_url))
        .collect()
}

fn build_target(raw: RawTargetSettings, base_url: Option<&Url>) -> Result<TargetSettings, LoadError> {
    let id = raw.id.map(|id| id.trim().to_string()).unwrap_or_default();
    if id.is_empty() {
        return Err(LoadError::invalid("targets.id", "every target needs an id"));
    }

    let kind = match raw.kind.as_deref() {
        Some(value) => TargetKind::from_str(value.trim())
            .map_err(|err| LoadError::invalid("targets.kind", format!("`{id}`: {err}")))?,
        None => TargetKind::Page,
    };
    let priority = match raw.priority.as_deref() {
        Some(value) => Priority::from_str(value.trim())
            .map_err(|err| LoadError::invalid("targets.priority", format!("`{id}`: {err}")))?,
        None => Priority::Normal,
    };

    let url = match raw.url.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Url::parse(value)
            .map_err(|err| LoadError::invalid("targets.url", format!("`{id}`: {err}")))?,
        _ => resolve_against_base(&id, base_url)?,
    };

    let method = match raw.method.as_deref().map(str::trim) {
        None | Some("") => Method::GET,
        Some(value) => Method::from_bytes(value.to_ascii_uppercase().as_bytes())
            .map_err(|err| LoadError::invalid("targets.method", format!("`{id}`: {err}")))?,
    };

    Ok(TargetSettings {
        id,
        kind,
        priority,
        url,
        method,
    })
}

fn resolve_against_base(id: &str, base_url: Option<&Url>) -> Result<Url, LoadError> {
    let Some(base) = base_url else {
        return Err(LoadError::invalid(
            "targets.url",
            format!("`{id}` has no url and `warming.base_url` is unset"),
        ));
    };
    if !id.starts_with('/') {
        return Err(LoadError::invalid(
            "targets.url",
            format!("`{id}` is not a path; set an explicit url"),
        ));
    }
    base.join(id)
        .map_err(|err| LoadError::invalid("targets.url", format!("`{id}`: {err}")))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
struct RawAdminSettings {
    token: Option<String>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWarmingSettings {
    base_url: Option<String>,
    default_concurrency: Option<usize>,
    max_concurrency: Option<usize>,
    critical_concurrency: Option<usize>,
    smart_concurrency: Option<usize>,
    deployment_concurrency: Option<usize>,
    timeout_ms: Option<u64>,
    stale_critical_seconds: Option<u64>,
    stale_high_seconds: Option<u64>,
    stale_normal_seconds: Option<u64>,
    stale_low_seconds: Option<u64>,
    success_rate_floor: Option<f64>,
    health_window_events: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEventLogSettings {
    backend: Option<String>,
    capacity: Option<usize>,
    path: Option<PathBuf>,
    fallback: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    enabled: Option<bool>,
    cadence_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTargetSettings {
    id: Option<String>,
    kind: Option<String>,
    priority: Option<String>,
    url: Option<String>,
    method: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
