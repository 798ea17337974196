//! HTTP implementations of the collaborator contracts.
//!
//! All clients are built on `reqwest::blocking` because the core pipeline is synchronous.
//! Create, call and drop them off the async runtime (inside `spawn_blocking`).
//!
//! Endpoints, relative to each service's base URL:
//! - routing: `POST /routing/decide?isTestUser=..&sender=..` with the FHIR bundle as body
//! - concept maps: `GET /conceptmaps/{name}` answering a `{ code: target }` object
//! - code lookup: `GET /conceptmaps/{name}/translate?code=..` answering `{ "target": .. }`,
//!   or 404 when the code is unknown
//! - storage: `POST /transactions` with the JSON transaction
//! - enrichment: `GET /provenance?compositionId=..` with the sender's `Authorization` header

use fhir::Resource;
use nps_core::collaborators::{
    CodeLookupService, CollaboratorError, CollaboratorResult, ConceptMapSource,
    ContextEnrichmentService, DocumentStorageWriter, RoutingDecisionService, StorageTransaction,
};
use nps_core::{ProcessingError, ProcessingResult, RoutingDecision};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const FHIR_JSON: &str = "application/fhir+json";

/// Shared blocking HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> ProcessingResult<Client> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        ProcessingError::InvalidConfig(format!("failed to create HTTP client: {e}"))
    })
}

fn unavailable(service: &'static str) -> impl Fn(reqwest::Error) -> CollaboratorError {
    move |err| CollaboratorError::Unavailable {
        service,
        reason: err.to_string(),
    }
}

fn invalid_response(service: &'static str, reason: impl ToString) -> CollaboratorError {
    CollaboratorError::InvalidResponse {
        service,
        reason: reason.to_string(),
    }
}

fn require_success(service: &'static str, response: Response) -> CollaboratorResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::warn!(service, status = status.as_u16(), "collaborator rejected request");
        Err(CollaboratorError::Rejected {
            service,
            status: status.as_u16(),
        })
    }
}

pub struct RoutingClient {
    http: Client,
    base_url: String,
}

impl RoutingClient {
    const SERVICE: &'static str = "routing";

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl RoutingDecisionService for RoutingClient {
    fn decide(
        &self,
        encoded_bundle: &str,
        is_test_user: bool,
        sender: Option<&str>,
    ) -> CollaboratorResult<RoutingDecision> {
        let mut request = self
            .http
            .post(format!("{}/routing/decide", self.base_url))
            .query(&[("isTestUser", is_test_user.to_string())])
            .header(CONTENT_TYPE, FHIR_JSON)
            .body(encoded_bundle.to_string());
        if let Some(sender) = sender {
            request = request.query(&[("sender", sender)]);
        }

        let response = request.send().map_err(unavailable(Self::SERVICE))?;
        let text = require_success(Self::SERVICE, response)?
            .text()
            .map_err(unavailable(Self::SERVICE))?;

        RoutingDecision::parse(&text).map_err(|err| match err {
            ProcessingError::RoutingService(inner) => inner,
            other => invalid_response(Self::SERVICE, other),
        })
    }
}

/// Serves both code-mapping providers from one terminology service.
pub struct TerminologyClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Translation {
    #[serde(default)]
    target: Option<String>,
}

impl TerminologyClient {
    const SERVICE: &'static str = "terminology";

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl ConceptMapSource for TerminologyClient {
    fn fetch_concept_map(&self, name: &str) -> CollaboratorResult<HashMap<String, String>> {
        let response = self
            .http
            .get(format!("{}/conceptmaps/{name}", self.base_url))
            .send()
            .map_err(unavailable(Self::SERVICE))?;

        let entries: HashMap<String, String> = require_success(Self::SERVICE, response)?
            .json()
            .map_err(|e| invalid_response(Self::SERVICE, e))?;
        tracing::debug!(concept_map = name, entries = entries.len(), "fetched concept map");
        Ok(entries)
    }
}

impl CodeLookupService for TerminologyClient {
    fn lookup(&self, concept_map: &str, code: &str) -> CollaboratorResult<Option<String>> {
        let response = self
            .http
            .get(format!("{}/conceptmaps/{concept_map}/translate", self.base_url))
            .query(&[("code", code)])
            .send()
            .map_err(unavailable(Self::SERVICE))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let translation: Translation = require_success(Self::SERVICE, response)?
            .json()
            .map_err(|e| invalid_response(Self::SERVICE, e))?;
        Ok(translation.target.filter(|t| !t.trim().is_empty()))
    }
}

pub struct StorageClient {
    http: Client,
    base_url: String,
}

impl StorageClient {
    const SERVICE: &'static str = "storage";

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl DocumentStorageWriter for StorageClient {
    fn store(&self, transaction: &StorageTransaction) -> CollaboratorResult<()> {
        let response = self
            .http
            .post(format!("{}/transactions", self.base_url))
            .json(transaction)
            .send()
            .map_err(unavailable(Self::SERVICE))?;
        require_success(Self::SERVICE, response)?;

        tracing::debug!(
            notification = transaction.notification_id.as_deref().unwrap_or_default(),
            deliveries = transaction.deliveries.len(),
            "stored transaction"
        );
        Ok(())
    }
}

pub struct EnrichmentClient {
    http: Client,
    base_url: String,
}

impl EnrichmentClient {
    const SERVICE: &'static str = "enrichment";

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl ContextEnrichmentService for EnrichmentClient {
    fn enrich(&self, credential: &str, composition_id: &str) -> CollaboratorResult<Resource> {
        if credential.trim().is_empty() {
            return Err(CollaboratorError::MissingCredential);
        }

        let response = self
            .http
            .get(format!("{}/provenance", self.base_url))
            .query(&[("compositionId", composition_id)])
            .header(AUTHORIZATION, credential)
            .send()
            .map_err(unavailable(Self::SERVICE))?;

        let value: serde_json::Value = require_success(Self::SERVICE, response)?
            .json()
            .map_err(|e| invalid_response(Self::SERVICE, e))?;
        Resource::from_value(value).map_err(|e| invalid_response(Self::SERVICE, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nps_core::routing::Action;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        tokio::task::spawn_blocking(f).await.expect("blocking task")
    }

    fn client() -> Client {
        http_client(Duration::from_secs(5)).expect("client")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn routing_posts_the_bundle_and_parses_the_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/routing/decide"))
            .and(query_param("isTestUser", "true"))
            .and(query_param("sender", "test-int"))
            .and(header("content-type", FHIR_JSON))
            .and(body_string("{\"resourceType\":\"Bundle\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "DISEASE",
                "notificationCategory": "P6_1",
                "routes": [{
                    "type": "HEALTH_OFFICE",
                    "specificReceiverId": "1.01.0.53.",
                    "actions": ["NOT_BY_NAME"]
                }],
                "responsible": "1.01.0.53."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let decision = blocking(move || {
            RoutingClient::new(client(), base).decide(
                "{\"resourceType\":\"Bundle\"}",
                true,
                Some("test-int"),
            )
        })
        .await
        .expect("decision");

        assert_eq!(decision.responsible.as_deref(), Some("1.01.0.53."));
        assert_eq!(decision.routes[0].actions, vec![Action::NotByName]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn routing_failures_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"routes\": 7}"))
            .mount(&server)
            .await;

        let base = server.uri();
        let (rejected, garbled) = blocking(move || {
            let routing = RoutingClient::new(client(), base);
            (
                routing.decide("{}", false, None),
                routing.decide("{}", false, None),
            )
        })
        .await;

        assert!(matches!(
            rejected,
            Err(CollaboratorError::Rejected { status: 503, .. })
        ));
        match garbled {
            Err(CollaboratorError::InvalidResponse { reason, .. }) => {
                assert!(reason.contains("routes"), "unexpected reason: {reason}")
            }
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_service_is_unavailable() {
        let result = blocking(|| {
            RoutingClient::new(client(), "http://127.0.0.1:9").decide("{}", false, None)
        })
        .await;
        assert!(matches!(
            result,
            Err(CollaboratorError::Unavailable { service: "routing", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concept_maps_and_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conceptmaps/DiseaseMap"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cvdd": "ts" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conceptmaps/DiseaseMap/translate"))
            .and(query_param("code", "cvdd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "target": "ts" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conceptmaps/DiseaseMap/translate"))
            .and(query_param("code", "xxx"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = server.uri();
        let (map, hit, miss) = blocking(move || {
            let terminology = TerminologyClient::new(client(), base);
            (
                terminology.fetch_concept_map("DiseaseMap"),
                terminology.lookup("DiseaseMap", "cvdd"),
                terminology.lookup("DiseaseMap", "xxx"),
            )
        })
        .await;

        assert_eq!(map.expect("map").get("cvdd").map(String::as_str), Some("ts"));
        assert_eq!(hit.expect("hit").as_deref(), Some("ts"));
        assert_eq!(miss.expect("miss"), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_posts_the_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let result = blocking(move || {
            StorageClient::new(client(), base)
                .store(&StorageTransaction::new(Some("n-1".into())))
        })
        .await;
        assert!(result.is_ok());

        let requests = server.received_requests().await.expect("recorded requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("json body");
        assert_eq!(body["notification_id"], "n-1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enrichment_forwards_the_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/provenance"))
            .and(query_param("compositionId", "c1"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Provenance",
                "id": "pv1"
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let (resource, blank) = blocking(move || {
            let enrichment = EnrichmentClient::new(client(), base);
            (
                enrichment.enrich("Bearer token", "c1"),
                enrichment.enrich(" ", "c1"),
            )
        })
        .await;

        let resource = resource.expect("resource");
        assert_eq!(resource.resource_type(), "Provenance");
        assert_eq!(resource.id(), Some("pv1"));
        assert!(matches!(blank, Err(CollaboratorError::MissingCredential)));
    }
}
