//! Shared fixtures and in-memory collaborators for unit tests.

use crate::code_mapping::CodeMapper;
use crate::collaborators::{
    CodeLookupService, CollaboratorError, CollaboratorResult, ConceptMapSource,
    ContextEnrichmentService, DocumentStorageWriter, RoutingDecisionService, StorageTransaction,
};
use crate::config::{CodeMappingConfig, CodeMappingProvider, ProcessingConfig};
use crate::constants::{
    ADDRESS_USE_EXTENSION, DEFAULT_CACHE_RELOAD_INTERVAL_SECS, DEFAULT_DISEASE_CONCEPT_MAP,
    DEFAULT_LABORATORY_CONCEPT_MAP, DISEASE_BUNDLE_PROFILE, LABORATORY_BUNDLE_PROFILE,
    NOTIFICATION_BUNDLE_ID_SYSTEM, PSEUDONYM_EXTENSION,
};
use crate::ids::IdGenerator;
use crate::notification::Notification;
use crate::routing::RoutingDecision;
use crate::test_user::TestUserConfiguration;
use fhir::{Bundle, OtherResource, Patient, Resource, Severity};
use nps_types::NonEmptyText;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NOTIFICATION_ID: &str = "a5e00874-bb26-45ac-8eea-0bde76456703";
pub const FALLBACK_DESTINATION: &str = "1.99.99.";

fn patient_json() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "p1",
        "meta": {"profile": ["https://demis.rki.de/fhir/StructureDefinition/NotifiedPerson"]},
        "extension": [
            {"url": PSEUDONYM_EXTENSION, "valueString": "pseudo-123"},
            {"url": "https://example.org/Salutation", "valueString": "Ms"}
        ],
        "identifier": [{"system": "https://example.org/pid", "value": "42"}],
        "name": [{"family": "Williams", "given": ["Sarah"]}],
        "telecom": [{"system": "phone", "value": "0123 456789"}],
        "gender": "female",
        "birthDate": "1992-03-20",
        "deceasedBoolean": false,
        "address": [
            {
                "extension": [
                    {"url": ADDRESS_USE_EXTENSION, "valueCoding": {"code": "primary"}},
                    {"url": "https://example.org/Other", "valueString": "x"}
                ],
                "line": ["Main St 1"],
                "city": "Berlin",
                "postalCode": "10115",
                "country": "DE"
            },
            {"line": ["No Postal Code Rd 9"], "city": "Hamburg", "country": "DE"}
        ]
    })
}

pub fn identified_patient() -> Patient {
    match Resource::from_value(patient_json()) {
        Ok(Resource::Patient(patient)) => patient,
        other => panic!("fixture patient did not parse: {other:?}"),
    }
}

fn reference(resource: &Value) -> String {
    format!(
        "{}/{}",
        resource["resourceType"].as_str().unwrap_or_default(),
        resource["id"].as_str().unwrap_or_default()
    )
}

fn entry(resource: Value) -> Value {
    let url = format!("https://demis.rki.de/fhir/{}", reference(&resource));
    json!({"fullUrl": url, "resource": resource})
}

/// Composition, notified person, notifier and submitter, followed by `records`.
fn bundle(profile: &str, title: &str, records: Vec<Value>) -> Bundle {
    let primary = reference(&records[0]);
    let mut entries = vec![
        entry(json!({
            "resourceType": "Composition",
            "id": "c1",
            "status": "final",
            "title": title,
            "subject": {"reference": "Patient/p1"},
            "author": [{"reference": "PractitionerRole/notifier"}],
            "section": [{
                "entry": [
                    {"reference": primary},
                    {"reference": "PractitionerRole/notifier"}
                ]
            }]
        })),
        entry(patient_json()),
        entry(json!({
            "resourceType": "PractitionerRole",
            "id": "notifier",
            "organization": {"reference": "Organization/submitter"}
        })),
        entry(json!({
            "resourceType": "Organization",
            "id": "submitter",
            "name": "Charité Labor"
        })),
    ];
    entries.extend(records.into_iter().map(entry));

    let value = json!({
        "resourceType": "Bundle",
        "id": "b1",
        "meta": {"profile": [profile]},
        "identifier": {"system": NOTIFICATION_BUNDLE_ID_SYSTEM, "value": NOTIFICATION_ID},
        "type": "document",
        "timestamp": "2024-03-01T10:00:00+01:00",
        "entry": entries
    });
    match Bundle::from_value(value) {
        Ok(bundle) => bundle,
        Err(err) => panic!("fixture bundle did not parse: {err}"),
    }
}

pub fn disease_bundle() -> Bundle {
    bundle(
        DISEASE_BUNDLE_PROFILE,
        "Disease notification",
        vec![
            json!({
                "resourceType": "Condition",
                "id": "d1",
                "code": {"coding": [{"system": "https://demis.rki.de/fhir/CodeSystem/notificationDiseaseCategory", "code": "cvdd"}]},
                "subject": {"reference": "Patient/p1"},
                "recorder": {"reference": "PractitionerRole/notifier"}
            }),
            json!({
                "resourceType": "Encounter",
                "id": "e1",
                "status": "in-progress",
                "subject": {"reference": "Patient/p1"}
            }),
        ],
    )
}

pub fn laboratory_bundle() -> Bundle {
    bundle(
        LABORATORY_BUNDLE_PROFILE,
        "Laboratory notification",
        vec![
            json!({
                "resourceType": "DiagnosticReport",
                "id": "r1",
                "status": "final",
                "code": {"coding": [{"system": "https://demis.rki.de/fhir/CodeSystem/notificationCategory", "code": "cvdp"}]},
                "performer": [{"reference": "PractitionerRole/notifier"}],
                "result": [{"reference": "Observation/o1"}]
            }),
            json!({
                "resourceType": "Observation",
                "id": "o1",
                "status": "final",
                "valueString": "positive",
                "performer": [{"reference": "PractitionerRole/notifier"}]
            }),
            json!({
                "resourceType": "Specimen",
                "id": "s1",
                "collection": {
                    "collector": {"reference": "PractitionerRole/notifier"},
                    "collectedDateTime": "2024-02-28"
                }
            }),
        ],
    )
}

pub fn test_users(forward: bool) -> TestUserConfiguration {
    TestUserConfiguration::new(
        HashSet::from(["test-int".to_string()]),
        NonEmptyText::new(FALLBACK_DESTINATION).expect("fallback destination"),
        forward,
    )
}

pub fn config(forward: bool) -> Arc<ProcessingConfig> {
    Arc::new(
        ProcessingConfig::new(
            test_users(forward),
            Severity::Warning,
            Duration::from_secs(DEFAULT_CACHE_RELOAD_INTERVAL_SECS),
            CodeMappingConfig::new(CodeMappingProvider::Cache).expect("code mapping config"),
        )
        .expect("processing config"),
    )
}

pub fn disease_notification(sender: Option<&str>) -> Notification {
    Notification::from_bundle(disease_bundle(), sender, &test_users(false))
        .expect("disease notification")
}

pub fn laboratory_notification(sender: Option<&str>) -> Notification {
    Notification::from_bundle(laboratory_bundle(), sender, &test_users(false))
        .expect("laboratory notification")
}

pub fn code_mapper() -> CodeMapper {
    let concept_maps = FakeConceptMaps::new(HashMap::from([
        (
            DEFAULT_DISEASE_CONCEPT_MAP.to_string(),
            HashMap::from([("cvdd".to_string(), "ts".to_string())]),
        ),
        (
            DEFAULT_LABORATORY_CONCEPT_MAP.to_string(),
            HashMap::from([("cvdp".to_string(), "tl".to_string())]),
        ),
    ]));
    CodeMapper::from_config(
        &CodeMappingConfig::new(CodeMappingProvider::Cache).expect("code mapping config"),
        Arc::new(concept_maps),
        Arc::new(FakeCodeLookup::failing()),
    )
}

/// Deterministic ids: `generated-1`, `generated-2`, ...
#[derive(Default)]
pub struct SequenceIds {
    next: AtomicUsize,
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> String {
        format!("generated-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub struct FakeConceptMaps {
    maps: HashMap<String, HashMap<String, String>>,
}

impl FakeConceptMaps {
    pub fn new(maps: HashMap<String, HashMap<String, String>>) -> Self {
        Self { maps }
    }
}

impl ConceptMapSource for FakeConceptMaps {
    fn fetch_concept_map(&self, name: &str) -> CollaboratorResult<HashMap<String, String>> {
        Ok(self.maps.get(name).cloned().unwrap_or_default())
    }
}

pub struct FakeCodeLookup {
    codes: Option<HashMap<(String, String), String>>,
}

impl FakeCodeLookup {
    pub fn new(codes: HashMap<(String, String), String>) -> Self {
        Self { codes: Some(codes) }
    }

    pub fn failing() -> Self {
        Self { codes: None }
    }
}

impl CodeLookupService for FakeCodeLookup {
    fn lookup(&self, concept_map: &str, code: &str) -> CollaboratorResult<Option<String>> {
        let codes = self.codes.as_ref().ok_or(CollaboratorError::Unavailable {
            service: "code-lookup",
            reason: "offline".into(),
        })?;
        Ok(codes
            .get(&(concept_map.to_string(), code.to_string()))
            .cloned())
    }
}

pub struct FakeRouting {
    decision: Result<RoutingDecision, String>,
    calls: AtomicUsize,
    last_test_user: Mutex<Option<bool>>,
}

impl FakeRouting {
    pub fn new(decision: CollaboratorResult<RoutingDecision>) -> Self {
        Self {
            decision: decision.map_err(|e| e.to_string()),
            calls: AtomicUsize::new(0),
            last_test_user: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_test_user(&self) -> Option<bool> {
        *self.last_test_user.lock().expect("routing lock")
    }
}

impl RoutingDecisionService for FakeRouting {
    fn decide(
        &self,
        encoded_bundle: &str,
        is_test_user: bool,
        _sender: Option<&str>,
    ) -> CollaboratorResult<RoutingDecision> {
        assert!(encoded_bundle.contains("\"resourceType\":\"Bundle\""));
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_test_user.lock().expect("routing lock") = Some(is_test_user);
        self.decision
            .clone()
            .map_err(|reason| CollaboratorError::Unavailable {
                service: "routing",
                reason,
            })
    }
}

/// Records successful transactions; fails any transaction addressed to `failing_receiver`.
#[derive(Default)]
pub struct FakeStorage {
    failing_receiver: Option<String>,
    stored: Mutex<Vec<StorageTransaction>>,
}

impl FakeStorage {
    pub fn failing_for(receiver: &str) -> Self {
        Self {
            failing_receiver: Some(receiver.to_string()),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn transactions(&self) -> Vec<StorageTransaction> {
        self.stored.lock().expect("storage lock").clone()
    }
}

impl DocumentStorageWriter for FakeStorage {
    fn store(&self, transaction: &StorageTransaction) -> CollaboratorResult<()> {
        let fails = transaction
            .deliveries
            .iter()
            .any(|d| Some(&d.receiver) == self.failing_receiver.as_ref());
        if fails {
            return Err(CollaboratorError::Rejected {
                service: "storage",
                status: 503,
            });
        }
        self.stored
            .lock()
            .expect("storage lock")
            .push(transaction.clone());
        Ok(())
    }
}

/// Appends a Provenance record keyed by the composition id.
pub struct FakeEnrichment;

impl ContextEnrichmentService for FakeEnrichment {
    fn enrich(&self, _credential: &str, composition_id: &str) -> CollaboratorResult<Resource> {
        Ok(Resource::Other(OtherResource::new(
            "Provenance",
            Some(format!("enrichment-{composition_id}")),
        )))
    }
}
