//! skyqc-sa - Site Analysis service
//!
//! Analyzes drone imagery sites on remote storage: walks a site's folders
//! over a pluggable transport, extracts GPS fixes from image headers with
//! bounded prefix reads and a pooled session set, classifies outliers
//! with an IQR fence, and serves the flight path payload over HTTP.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use skyqc_common::AnalysisConfig;

use crate::services::ConnectionService;
use crate::transport::TransportRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Analysis tunables loaded at startup
    pub config: Arc<AnalysisConfig>,
    /// Registry of live remote connections
    pub connections: Arc<ConnectionService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AnalysisConfig, registry: TransportRegistry) -> Self {
        let config = Arc::new(config);
        let connections = Arc::new(ConnectionService::new(
            registry,
            config.session_expiry(),
        ));
        Self {
            config,
            connections,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::session_routes())
        .merge(api::site_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodic sweep of idle sessions; runs for the life of the process.
pub fn spawn_session_sweeper(state: &AppState, interval: Duration) {
    let connections = Arc::clone(&state.connections);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let removed = connections.cleanup_expired().await;
            if removed > 0 {
                tracing::info!("Session sweep removed {} idle sessions", removed);
            }
        }
    });
}
