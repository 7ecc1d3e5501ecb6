//! Ldapgate server implementation

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use ldapgate_auth::{Directory, TokenService};
use ldapgate_core::{config::ServerConfig, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{error, info};

use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::middleware::require_json;
use crate::routes;

/// Read-only state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub tokens: Arc<TokenService>,
    pub token_ttl: Duration,
}

/// Ldapgate HTTP server. Each instance owns its own router.
pub struct AuthServer {
    config: ServerConfig,
    state: AppState,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl AuthServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            metrics: None,
        }
    }

    /// Expose `/metrics` from `recorder`
    pub fn with_metrics(mut self, recorder: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(recorder);
        self
    }

    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/auth", post(routes::exchange_handler))
            .route("/token", post(routes::review_handler))
            .route_layer(middleware::from_fn(require_json))
            .with_state(self.state.clone());

        if let Some(recorder) = &self.metrics {
            router = router.route("/metrics", get(metrics_handler).with_state(recorder.clone()));
        }

        router
            .layer(middleware::from_fn(metrics_middleware))
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::default().include_headers(false)),
            )
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("Ldapgate listening on http://{}", addr);
        info!("Credential exchange at http://{}/auth", addr);
        info!("Token review at http://{}/token", addr);
        if self.metrics.is_some() {
            info!("Prometheus metrics at http://{}/metrics", addr);
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
