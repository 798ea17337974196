//! # API REST
//!
//! HTTP front door for the notification pipeline.
//!
//! Handles:
//! - HTTP endpoints with axum (`GET /health`, `POST /$process-notification`)
//! - blocking HTTP clients for the external services ([`clients`])
//! - the periodic code-mapping cache refresh ([`refresh`])
//! - service configuration from the environment ([`config`])
//!
//! The pipeline itself lives in `nps-core` and is synchronous; every request runs it on the
//! blocking pool.

#![warn(rust_2018_idioms)]

pub mod clients;
pub mod config;
pub mod refresh;

pub use config::ServiceConfig;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clients::{EnrichmentClient, RoutingClient, StorageClient, TerminologyClient};
use fhir::{Bundle, OperationOutcome};
use nps_core::code_mapping::{CachedCodeMapper, ExternalCodeMapper};
use nps_core::collaborators::ContextEnrichmentService;
use nps_core::{
    CodeMapper, CodeMappingProvider, Collaborators, ErrorCode, NotificationProcessor,
    ProcessingConfig, ProcessingError, ProcessingResult,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

pub const SENDER_HEADER: &str = "x-sender-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for the request handlers.
#[derive(Clone)]
pub struct AppState {
    processor: Arc<NotificationProcessor>,
}

impl AppState {
    pub fn new(processor: Arc<NotificationProcessor>) -> Self {
        Self { processor }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Build the REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/$process-notification", post(process_notification))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire the HTTP collaborators into a processor.
///
/// Blocking: call from outside the async runtime or inside `spawn_blocking`.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidConfig`] if the URL the configured code-mapping provider
/// needs is unset, or the HTTP client cannot be created.
pub fn build_processor(
    processing: Arc<ProcessingConfig>,
    service: &ServiceConfig,
) -> ProcessingResult<NotificationProcessor> {
    let http = clients::http_client(service.http_timeout)?;

    let mapping = processing.code_mapping();
    let code_mapper = match mapping.provider {
        CodeMappingProvider::Cache => {
            let url = service.concept_map_url.as_ref().ok_or_else(|| {
                ProcessingError::InvalidConfig(
                    "NPS_CONCEPT_MAP_URL must be set for the cache code-mapping provider".into(),
                )
            })?;
            let source = Arc::new(TerminologyClient::new(http.clone(), url));
            CodeMapper::Cached(CachedCodeMapper::new(source, mapping))
        }
        CodeMappingProvider::External => {
            let url = service.code_lookup_url.as_ref().ok_or_else(|| {
                ProcessingError::InvalidConfig(
                    "NPS_CODE_LOOKUP_URL must be set for the external code-mapping provider".into(),
                )
            })?;
            let lookup = Arc::new(TerminologyClient::new(http.clone(), url));
            CodeMapper::External(ExternalCodeMapper::new(lookup, mapping))
        }
    };

    let enrichment = service.enrichment_url.as_ref().map(|url| {
        Arc::new(EnrichmentClient::new(http.clone(), url)) as Arc<dyn ContextEnrichmentService>
    });
    if enrichment.is_none() {
        tracing::info!("NPS_ENRICHMENT_URL not set; context enrichment disabled");
    }

    let collaborators = Collaborators {
        routing: Arc::new(RoutingClient::new(http.clone(), &service.routing_url)),
        storage: Arc::new(StorageClient::new(http, &service.storage_url)),
        enrichment,
    };
    Ok(NotificationProcessor::new(processing, code_mapper, collaborators))
}

async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "NPS REST API is alive".into(),
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn process_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id =
        header_value(&headers, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
    let sender = header_value(&headers, SENDER_HEADER);
    let credential = header_value(&headers, AUTHORIZATION.as_str());

    let processor = Arc::clone(&state.processor);
    let result = tokio::task::spawn_blocking(move || {
        let text = std::str::from_utf8(&body).map_err(|err| {
            ProcessingError::InvalidInput(format!("request body is not UTF-8: {err}"))
        })?;
        let bundle = Bundle::parse(text)?;
        let notification = processor.notification(bundle, sender.as_deref())?;
        processor.process(notification, credential.as_deref())
    })
    .await;

    match result {
        Ok(Ok(parameters)) => {
            tracing::info!(request = %correlation_id, "notification processed");
            (
                StatusCode::OK,
                [(REQUEST_ID_HEADER, correlation_id)],
                Json(parameters),
            )
                .into_response()
        }
        Ok(Err(err)) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(request = %correlation_id, error = %err, "processing failed");
            } else {
                tracing::warn!(request = %correlation_id, error = %err, "notification rejected");
            }
            let outcome = state.processor.error_outcome(&err, Some(&correlation_id));
            outcome_response(status, correlation_id, outcome)
        }
        Err(err) => {
            tracing::error!(request = %correlation_id, error = %err, "processing task failed");
            let outcome = state.processor.assembler().build_error(
                Some(&correlation_id),
                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                ErrorCode::Internal,
                "Internal error",
                None,
            );
            outcome_response(StatusCode::INTERNAL_SERVER_ERROR, correlation_id, outcome)
        }
    }
}

fn outcome_response(
    status: StatusCode,
    correlation_id: String,
    outcome: OperationOutcome,
) -> Response {
    (status, [(REQUEST_ID_HEADER, correlation_id)], Json(outcome)).into_response()
}
