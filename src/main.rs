use std::process;

use prewarm::{
    application::error::AppError,
    config::{self, Settings, StrategyArg, TargetSettings, WarmArgs},
    domain::types::{Priority, TargetKind},
    infra::{
        error::InfraError,
        http::{self, AdminState},
        refresh,
        runtime::{Engine, Scheduler},
        telemetry,
    },
    warming::RunOptions,
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warm(args) => run_warm(settings, args).await,
        config::Command::Targets(_) => run_targets(&settings),
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let engine = Engine::from_settings(&settings).await?;

    let scheduler = settings
        .scheduler
        .enabled
        .then(|| Scheduler::spawn(engine.warmer.clone(), settings.scheduler.cadence));

    let admin_state = AdminState::new(engine, &settings.admin);
    let router = http::build_admin_router(admin_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "prewarm::server",
        addr = %settings.server.addr,
        environment = ?settings.admin.environment,
        "admin API listening"
    );

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    if let Some(scheduler) = scheduler {
        scheduler.shutdown(settings.server.graceful_shutdown).await;
    }
    info!(target = "prewarm::server", "shutdown complete");

    result
}

async fn run_warm(settings: Settings, args: WarmArgs) -> Result<(), AppError> {
    let engine = Engine::from_settings(&settings).await?;
    let options = RunOptions {
        concurrency: args.concurrency,
        ..RunOptions::default()
    };

    let warmer = &engine.warmer;
    let run = match args.strategy {
        StrategyArg::Warm => warmer.warm(&args.targets, options).await?,
        StrategyArg::Critical => warmer.critical(options).await?,
        StrategyArg::Smart => warmer.smart(options).await?,
        StrategyArg::Deployment => warmer.deployment(options).await?,
    };

    print_json(&run)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetListing<'a> {
    id: &'a str,
    kind: TargetKind,
    priority: Priority,
    method: &'a str,
    url: &'a str,
}

impl<'a> From<&'a TargetSettings> for TargetListing<'a> {
    fn from(target: &'a TargetSettings) -> Self {
        Self {
            id: &target.id,
            kind: target.kind,
            priority: target.priority,
            method: target.method.as_str(),
            url: target.url.as_str(),
        }
    }
}

fn run_targets(settings: &Settings) -> Result<(), AppError> {
    // Same duplicate-id checks the engine applies at start-up.
    let client = refresh::build_client()?;
    refresh::build_registry(&settings.targets, &client)?;

    let listing: Vec<TargetListing<'_>> = settings.targets.iter().map(Into::into).collect();
    print_json(&listing)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{json}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "prewarm::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "prewarm::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "prewarm::server", "shutdown signal received");
}
