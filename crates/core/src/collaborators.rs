//! Contracts of the external services the pipeline consumes.
//!
//! The core performs no I/O of its own; every outbound call goes through one of these traits.
//! HTTP implementations live in the `api-rest` crate, tests use in-memory fakes.

use crate::routing::{Action, RoutingDecision};
use fhir::{Bundle, Resource};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse { service: &'static str, reason: String },
    #[error("{service} rejected the request with status {status}")]
    Rejected { service: &'static str, status: u16 },
    #[error("no credential supplied")]
    MissingCredential,
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Decides who is responsible for a notification.
pub trait RoutingDecisionService: Send + Sync {
    fn decide(
        &self,
        encoded_bundle: &str,
        is_test_user: bool,
        sender: Option<&str>,
    ) -> CollaboratorResult<RoutingDecision>;
}

/// Supplies complete concept maps for the cache-backed code mapper.
pub trait ConceptMapSource: Send + Sync {
    fn fetch_concept_map(&self, name: &str) -> CollaboratorResult<HashMap<String, String>>;
}

/// Translates single codes for the external code mapper.
pub trait CodeLookupService: Send + Sync {
    fn lookup(&self, concept_map: &str, code: &str) -> CollaboratorResult<Option<String>>;
}

/// Durable storage of outbound documents.
pub trait DocumentStorageWriter: Send + Sync {
    fn store(&self, transaction: &StorageTransaction) -> CollaboratorResult<()>;
}

/// Supplies an extra record (e.g. provenance) to append to the document.
pub trait ContextEnrichmentService: Send + Sync {
    fn enrich(&self, credential: &str, composition_id: &str) -> CollaboratorResult<Resource>;
}

/// One document prepared for one receiver.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Delivery {
    pub receiver: String,
    pub actions: Vec<Action>,
    /// Set when the receiver requires encryption; the transport performs it.
    pub encrypt: bool,
    pub bundle: Bundle,
}

/// A batch of deliveries stored atomically.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StorageTransaction {
    pub notification_id: Option<String>,
    pub deliveries: Vec<Delivery>,
}

impl StorageTransaction {
    pub fn new(notification_id: Option<String>) -> Self {
        Self {
            notification_id,
            deliveries: Vec::new(),
        }
    }

    pub fn push(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}
