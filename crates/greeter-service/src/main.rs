//! Greeter Service
//!
//! Entry point for the instrumented greeting service.

use greeter_service::config::Config;
use greeter_service::observability::{init_telemetry, HttpMetrics};
use greeter_service::routes::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: telemetry settings come from it
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    let mut telemetry = init_telemetry(&config.observability)?;

    info!(
        bind_address = %config.bind_address,
        service_name = %config.observability.service_name,
        otlp_export = telemetry.is_exporting(),
        "Starting Greeter Service"
    );

    // Instruments must be created after the meter provider is installed
    let state = Arc::new(AppState {
        http_metrics: HttpMetrics::from_global(),
    });

    let app = routes::build_routes(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| {
            error!("Failed to bind {}: {}", config.bind_address, e);
            e
        })?;

    info!("Greeter Service listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
        .await?;

    info!("Greeter Service shutdown complete");

    // Flush batched spans, metrics and logs before exit
    telemetry.shutdown();

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }
}
