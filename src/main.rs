//! # bpm-shifter - Main Application Entry Point
//!
//! HTTP service that re-tempos uploaded audio. The source tempo is read from the
//! file name (or supplied explicitly), the speed ratio is split into a chain
//! of ffmpeg `atempo` stages, and the transcoded file is returned for download.
//!
//! ## Application Architecture:
//! - **tempo**: pure tempo extraction, stage decomposition and request planning
//! - **transcoder**: runs ffmpeg with a stage chain
//! - **workspace**: per-job temp files in the upload directory
//! - **config**: application configuration (TOML file + environment variables)
//! - **state**: shared application state and metrics
//! - **health**: health and metrics endpoints
//! - **middleware**: request logging and metrics collection
//! - **handlers**: HTTP request handlers
//! - **error**: error types and HTTP error responses

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod tempo;
mod transcoder;
mod workspace;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use crate::config::AppConfig;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal handler task; polled by `wait_for_shutdown`.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Prepares the upload directory**
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting bpm-shifter v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config.clone());
    app_state
        .workspace
        .ensure()
        .await
        .with_context(|| format!("creating upload directory {}", config.uploads.dir.display()))?;
    info!(
        upload_dir = %app_state.workspace.dir().display(),
        ffmpeg = %config.transcoder.ffmpeg_path.display(),
        "Upload workspace ready"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(vec![
                handlers::STAGES_HEADER,
                middleware::logging::REQUEST_ID_HEADER,
            ])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order of registration for requests
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .route("/change-bpm", web::post().to(handlers::change_bpm))
            .service(
                web::scope("/api/v1")
                    .route("/plan", web::get().to(handlers::plan_tempo))
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first wins: the server itself, or a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "bpm_shifter=trace")
/// - If not set, defaults to "bpm_shifter=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bpm_shifter=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

/// Listen for SIGTERM/SIGINT and raise the shutdown flag.
///
/// In-flight transcodes finish before the server stops, since
/// `stop(true)` waits for running requests.
fn setup_signal_handlers() {
    tokio::spawn(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) = match (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
            ) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C");
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
