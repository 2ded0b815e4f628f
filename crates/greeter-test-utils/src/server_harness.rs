//! Test server harness for E2E testing
//!
//! Provides `TestGreeterServer` for spawning real greeter server instances in
//! tests. The server shares whatever telemetry the test process installed:
//! spawn it after `init_telemetry` to have its spans, metrics and logs
//! exported, or without it for plain HTTP tests.

use greeter_service::config::Config;
use greeter_service::observability::HttpMetrics;
use greeter_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the greeter service in E2E tests.
///
/// The server task is aborted when the harness is dropped, so each test owns
/// its server for exactly its own scope.
pub struct TestGreeterServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGreeterServer {
    /// Spawn a new test server instance with OTLP export disabled in config.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("OTEL_SERVICE_NAME".to_string(), "greeter-test".to_string()),
            ("OTEL_SDK_DISABLED".to_string(), "true".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        Self::spawn_with_config(config).await
    }

    /// Spawn a test server with an explicit configuration.
    ///
    /// Telemetry is not initialized here; the config is only carried for
    /// inspection. Metric instruments bind to the global meter provider at
    /// spawn time.
    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let state = Arc::new(AppState {
            http_metrics: HttpMetrics::from_global(),
        });

        // Build routes using the service's real route builder
        let app = routes::build_routes(state);

        let listener = tokio::net::TcpListener::bind(config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestGreeterServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
