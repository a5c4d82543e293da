//! HTTP front end for the synthesis service.
//!
//! Endpoints:
//! - `GET /` - voice picker page
//! - `POST /generate` - synthesize `{text, voice}` into a WAV file
//! - `GET /audio/<name>` - fetch a generated file by name
//! - `GET /voices` - the voice catalog as JSON
//! - `GET /health` - returns "ok"

mod page;
mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::catalog::VoiceCatalog;
use crate::config::ServerConfig;
use crate::service::SynthesisService;

pub use page::render_index;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SynthesisService>,
    pub catalog: Arc<VoiceCatalog>,
}

impl AppState {
    pub fn new(service: SynthesisService, catalog: VoiceCatalog) -> Self {
        Self {
            service: Arc::new(service),
            catalog: Arc::new(catalog),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/generate", post(routes::generate))
        .route("/audio/*name", get(routes::audio))
        .route("/voices", get(routes::voices))
        .route("/health", get(routes::health))
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C.
///
/// When the store has a retention policy, it is also applied every
/// `config.sweep_interval`.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.bind_addr();

    if !state.service.store().retention().is_unbounded() {
        let service = Arc::clone(&state.service);
        let period = config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let service = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || service.store().sweep()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::warn!("Retention sweep failed: {e}"),
                    Err(e) => log::warn!("Retention sweep task failed: {e}"),
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!(
        "Serving {} voices on http://{} (output: {})",
        state.catalog.len(),
        addr,
        state.service.store().dir().display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
