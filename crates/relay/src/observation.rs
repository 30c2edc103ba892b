//! Observation endpoint: `/metrics` renders the Prometheus text
//! exposition, `/health` reports whether the supervisor is still running.
//!
//! `PrometheusBuilder` normally installs its own single-route HTTP
//! listener, which has no room for a second route. This builds the
//! [`PrometheusHandle`] without installing a listener and serves it from
//! an `axum::Router` alongside `/health`, so both live behind one bound
//! socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use sluice_core::metrics::{PROCESSING_DURATION_BUCKETS, PROCESSING_LATENCY_SECONDS};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("failed to bind observation endpoint on '{addr}': {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure histogram buckets for '{metric}': {source}")]
    Buckets {
        metric: &'static str,
        #[source]
        source: metrics_exporter_prometheus::BuildError,
    },
}

#[derive(Clone)]
struct AppState {
    handle: PrometheusHandle,
    running: Arc<AtomicBool>,
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.handle.render()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.running.load(Ordering::SeqCst) {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    }
}

/// A bound observation endpoint; [`ObservationServer::shutdown`] stops it
/// as shutdown step 4 (§4.7).
pub struct ObservationServer {
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ObservationServer {
    /// Installs the global metrics recorder, registers every metric
    /// description, and starts serving `/metrics` + `/health` on `addr`.
    pub async fn start(addr: &str) -> Result<Self, ObservationError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(PROCESSING_LATENCY_SECONDS.to_owned()),
                PROCESSING_DURATION_BUCKETS,
            )
            .map_err(|source| ObservationError::Buckets {
                metric: PROCESSING_LATENCY_SECONDS,
                source,
            })?;
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::debug!("metrics recorder already installed");
        }
        sluice_core::metrics::describe_all();

        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| ObservationError::Bind {
                addr: addr.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid address"),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ObservationError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let state = AppState {
            handle,
            running: Arc::clone(&running),
        };
        let router = axum::Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        let serve_cancel = cancel.clone();
        tracing::info!(addr = %addr, "observation endpoint listening");
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "observation endpoint terminated with error");
            }
        });

        Ok(Self {
            running,
            cancel,
            task,
        })
    }

    /// Stops serving `/health` as healthy and tears down the listener.
    pub async fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
