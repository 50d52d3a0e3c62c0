//! skyqc-sa - Site Analysis service
//!
//! HTTP service wrapping the site analysis engine: remote session
//! management, GPS extraction, outlier classification, flight path
//! payloads.

use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skyqc_common::AnalysisConfig;
use skyqc_sa::transport::TransportRegistry;
use skyqc_sa::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting skyqc-sa (Site Analysis) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AnalysisConfig::load()?;
    info!(
        "Analysis config: workers {}..{}, pool minimum {}, prefix {} bytes",
        config.min_workers, config.max_workers, config.min_pool_size, config.prefix_read_bytes
    );

    let state = AppState::new(config, TransportRegistry::with_builtin());
    skyqc_sa::spawn_session_sweeper(&state, SWEEP_INTERVAL);

    let app = skyqc_sa::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5870").await?;
    info!("Listening on http://127.0.0.1:5870");
    info!("Health check: http://127.0.0.1:5870/health");

    axum::serve(listener, app).await?;

    Ok(())
}
