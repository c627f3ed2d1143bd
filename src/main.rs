use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use convoy::api::{create_router, AppState};
use convoy::cli::{Cli, Commands};
use convoy::config::{AppConfig, LoggingConfig};
use convoy::coordination::{install_signal_handlers, GracefulShutdown};
use convoy::coordinator::LocationCoordinator;
use convoy::directory::InMemoryDirectory;
use convoy::geo::{haversine_km, validate_coordinates};
use convoy::simulator::MovementSimulator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, demo } => serve(&config, port, demo).await,
        Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        } => {
            validate_coordinates(lat1, lng1)?;
            validate_coordinates(lat2, lng2)?;
            println!("{:.3} km", haversine_km(lat1, lng1, lat2, lng2));
            Ok(())
        }
    }
}

async fn serve(config_dir: &str, port: Option<u16>, demo: bool) -> anyhow::Result<()> {
    let mut config = AppConfig::load_from(config_dir)
        .with_context(|| format!("failed to load configuration from {config_dir}"))?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Err(errors) = config.validate() {
        bail!("invalid configuration: {}", errors.join("; "));
    }

    let _log_guard = init_logging(&config.logging);

    let directory = Arc::new(InMemoryDirectory::new());
    let coordinator = LocationCoordinator::new(config.clone(), directory.clone());
    if demo {
        seed_demo(&directory, &coordinator).await?;
    }

    let shutdown = Arc::new(GracefulShutdown::with_defaults());
    install_signal_handlers(shutdown.clone()).await;

    let simulator = if config.simulation.enabled {
        Some(MovementSimulator::new(coordinator.state()).spawn(shutdown.clone()))
    } else {
        info!("movement simulator disabled");
        None
    };

    let app = create_router(AppState::new(coordinator.clone(), directory));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "convoy listening");

    let mut token = shutdown.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            token.wait_for_shutdown().await;
        })
        .await
        .context("server error")?;

    let state = coordinator.state();
    shutdown
        .execute(
            Box::pin(async move {
                if let Some(handle) = simulator {
                    let ticks = handle.shutdown().await;
                    info!(ticks, "movement simulator stopped");
                }
            }),
            Box::pin(async move {
                state.hub.close_all();
            }),
        )
        .await;

    Ok(())
}

/// Console logging plus an optional daily-rolling file. The returned guard
/// flushes the file writer on drop and must live as long as the process.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},convoy=debug", config.level)));

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    // rolling::daily panics if the first file cannot be created, so check first
    let mut guard = None;
    let file_layer = match config.dir.as_deref() {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "convoy.log");
                let (writer, worker_guard) = tracing_appender::non_blocking(appender);
                guard = Some(worker_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: could not create log directory {dir} ({e}), file logging disabled");
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

/// Register a demo group with three members walking around Madurai
async fn seed_demo(
    directory: &InMemoryDirectory,
    coordinator: &LocationCoordinator,
) -> anyhow::Result<()> {
    let (leader, leader_token) = directory.register_member("Asha");
    let group = directory.create_group("Temple run", &leader.id);
    info!(group = %group.id, code = %group.code, "demo group created");
    info!(member = %leader.id, name = %leader.display_name, token = %leader_token, "demo member");

    coordinator
        .update_location(&leader.id, &group.id, 9.9195, 78.1193, None)
        .await?;

    for (name, lat, lng) in [("Ravi", 9.9252, 78.1198), ("Meena", 9.9312, 78.1215)] {
        let (member, token) = directory.register_member(name);
        directory.join_group(&group.code, &member.id)?;
        coordinator
            .update_location(&member.id, &group.id, lat, lng, None)
            .await?;
        info!(member = %member.id, name, token = %token, "demo member");
    }

    warn!("demo mode: tokens above grant API access, do not use in production");
    Ok(())
}
