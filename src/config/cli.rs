use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the prewarm binary.
#[derive(Debug, Parser)]
#[command(name = "prewarm", version, about = "Cache warming and revalidation engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PREWARM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the admin HTTP surface and the optional warming scheduler.
    Serve(Box<ServeArgs>),
    /// Run one warming strategy in-process and print the run report as JSON.
    Warm(WarmArgs),
    /// Print the configured target registry.
    Targets(TargetsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
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

    /// Override the base URL path-style target ids are resolved against.
    #[arg(long = "warming-base-url", value_name = "URL")]
    pub warming_base_url: Option<String>,

    /// Override the per-call refresh timeout.
    #[arg(long = "warming-timeout-ms", value_name = "MILLIS")]
    pub warming_timeout_ms: Option<u64>,

    /// Override the event log backend (memory|jsonl).
    #[arg(long = "log-backend", value_name = "BACKEND")]
    pub log_backend: Option<String>,

    /// Override the JSON-lines event log path.
    #[arg(long = "log-path", value_name = "PATH")]
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the admin token.
    #[arg(long = "admin-token", value_name = "TOKEN")]
    pub admin_token: Option<String>,

    /// Override the admin environment (production|development).
    #[arg(long = "admin-environment", value_name = "ENV")]
    pub admin_environment: Option<String>,

    /// Toggle the scheduled smart warming loop.
    #[arg(
        long = "scheduler-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub scheduler_enabled: Option<bool>,

    /// Override the scheduled warming cadence.
    #[arg(long = "scheduler-cadence-seconds", value_name = "SECONDS")]
    pub scheduler_cadence_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Warm,
    Critical,
    Smart,
    Deployment,
}

#[derive(Debug, Args, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Strategy to run.
    #[arg(long, value_enum)]
    pub strategy: StrategyArg,

    /// Target id for the `warm` strategy; repeat for several.
    #[arg(long = "target", value_name = "ID")]
    pub targets: Vec<String>,

    /// Maximum concurrent refresh calls.
    #[arg(long, value_name = "COUNT")]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct TargetsArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}
