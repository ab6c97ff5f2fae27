//! # SoundPatch API - Main Application Entry Point
//!
//! Starts the Actix-web HTTP server for the SoundPatch AI backend.
//!
//! ## Startup sequence:
//! 1. Read `.env`, parse the command line (`--env development|production`)
//! 2. Load and validate configuration
//! 3. Initialise tracing for the selected profile
//! 4. Prepare the upload directory and the (lazy) Redis pool
//! 5. Serve until SIGINT/SIGTERM, then stop gracefully
//!
//! ## Application Architecture:
//! - **app**: the route table
//! - **cli**: command line and runtime profile
//! - **config**: layered configuration (defaults, TOML, environment)
//! - **state**: shared state and request metrics
//! - **health**: welcome, liveness, readiness and metrics endpoints
//! - **handlers**: message and info endpoints
//! - **middleware**: request logging and metrics
//! - **cache** / **storage**: the backing services probed by readiness
//! - **reload**: development-only config file watching
//! - **error**: error types and HTTP error responses

mod app;
mod cache;
mod cli;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod reload;
mod state;
mod storage;
mod telemetry;

use crate::cache::CacheClient;
use crate::cli::Cli;
use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::UploadStorage;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration ({})", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let environment = cli.environment;
    telemetry::init_tracing(environment, config.app.debug, config.logging.format)?;

    info!(
        "Starting {} v{} ({} build {})",
        config.app.name,
        config.app.version,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!(
        environment = %environment,
        workers = environment.workers(),
        debug = config.app.debug,
        reload = environment.reload_enabled(),
        "Runtime profile selected"
    );

    let storage = UploadStorage::prepare(&config.storage.upload_dir).await?;
    let cache = CacheClient::new(&config.redis)?;
    // The cache is started before us but may not be accepting connections yet.
    match cache.ping().await {
        Ok(()) => info!(url = %cache.url(), "Redis reachable"),
        Err(e) => warn!(url = %cache.url(), error = %e, "Redis not reachable yet, continuing"),
    }

    let app_state = AppState::new(config.clone(), environment, cache, storage);

    let _watcher = if environment.reload_enabled() {
        reload::spawn_config_reloader(cli.clone(), app_state.clone())?
    } else {
        None
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let api_prefix = config.app.api_prefix.clone();
    let json_limit = config.storage.max_upload_size;
    info!("Starting HTTP server on {} (API prefix {})", bind_addr, api_prefix);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        let prefix = api_prefix.clone();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .wrap(TracingLogger::<middleware::RequestSpan>::new())
            .configure(|cfg| app::configure(cfg, &prefix, json_limit))
    })
    .workers(environment.workers())
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM (what `docker stop` sends).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
