//! Prometheus metrics for Ldapgate
//!
//! Every recording goes through the `metrics` macros. Until the binary
//! installs a [`MetricsRecorder`] they are no-ops, so routers built in tests
//! need no setup.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ldapgate_core::{Error, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metric names
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "ldapgate_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "ldapgate_http_request_duration_seconds";

    pub const EXCHANGE_TOTAL: &str = "ldapgate_exchange_total";
    pub const REVIEW_TOTAL: &str = "ldapgate_review_total";
    pub const DIRECTORY_ERRORS_TOTAL: &str = "ldapgate_directory_errors_total";

    pub const UPTIME_SECONDS: &str = "ldapgate_uptime_seconds";
    pub const INFO: &str = "ldapgate_info";
}

/// Result of one credential exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Issued,
    Malformed,
    Unauthorized,
    Failed,
}

impl ExchangeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Malformed => "malformed",
            Self::Unauthorized => "unauthorized",
            Self::Failed => "failed",
        }
    }
}

/// Result of one token review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Authenticated,
    Unauthenticated,
    Malformed,
    Failed,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Malformed => "malformed",
            Self::Failed => "failed",
        }
    }
}

pub fn record_exchange(outcome: ExchangeOutcome) {
    counter!(names::EXCHANGE_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_review(outcome: ReviewOutcome) {
    counter!(names::REVIEW_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// `kind` is [`DirectoryError::kind`](ldapgate_auth::DirectoryError::kind)
pub fn record_directory_error(kind: &'static str) {
    counter!(names::DIRECTORY_ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// Process-wide Prometheus recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the Prometheus recorder as the global recorder. Fails if one
    /// is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| Error::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;

        gauge!(names::INFO, "version" => ldapgate_core::VERSION).set(1.0);

        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Matched route only, so arbitrary paths cannot grow label cardinality
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    record_http_request(&method, &path, status, duration);

    debug!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render(),
    )
}
