//! Notification processing service runner.
//!
//! ## Purpose
//! Loads the service and processing configuration, wires the HTTP collaborators into the
//! pipeline, starts the cache refresh task and serves the REST API.
//!
//! ## Environment
//! See `api_rest::config` for the variables. A `.env` file in the working directory is read
//! first when present.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{refresh, AppState, ServiceConfig};
use nps_core::ProcessingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nps=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let service = ServiceConfig::from_env()?;
    let processing = Arc::new(ProcessingConfig::load(&service.config_file)?);
    tracing::info!(
        config = %service.config_file.display(),
        provider = ?processing.code_mapping().provider,
        threshold = %processing.outcome_threshold(),
        "++ Loaded configuration"
    );

    // The blocking HTTP clients cannot be created on a runtime thread.
    let processor = {
        let processing = Arc::clone(&processing);
        let service = service.clone();
        tokio::task::spawn_blocking(move || api_rest::build_processor(processing, &service))
            .await??
    };
    let processor = Arc::new(processor);

    let _refresh = refresh::spawn_refresh(
        processor.code_mapper().reloadables(),
        processing.cache_reload_interval(),
    );

    tracing::info!("++ Starting NPS REST on {}", service.rest_addr);
    let app = api_rest::router(AppState::new(processor));
    let listener = tokio::net::TcpListener::bind(&service.rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
