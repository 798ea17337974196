//! FHIR wire/boundary support for notification processing.
//!
//! This crate provides the **document model** that the processing core operates on:
//! - an arena-backed [`Bundle`] with an index from logical references to entry slots
//! - the handful of resources the core inspects or rewrites ([`Composition`], [`Patient`])
//! - an opaque carrier ([`OtherResource`]) for every other record, preserved verbatim
//! - the response resources ([`OperationOutcome`], [`Parameters`])
//!
//! This crate focuses on:
//! - serialisation/deserialisation of FHIR JSON
//! - structural navigation (subject lookup, reference resolution, slot replacement)
//!
//! It deliberately does not validate documents against FHIR profiles. Only the fields the
//! processing pipeline reads or rewrites are modelled; everything else rides along in
//! flattened JSON maps so that a parse/render cycle does not lose data.

pub mod bundle;
pub mod datatypes;
pub mod outcome;
pub mod parameters;
pub mod patient;
pub mod resource;

pub use bundle::{Bundle, Entry};
pub use datatypes::{Address, CodeableConcept, Coding, Extension, Identifier, Meta, Reference};
pub use outcome::{Issue, IssueType, OperationOutcome, Severity};
pub use parameters::{Parameter, ParameterResource, Parameters};
pub use patient::Patient;
pub use resource::{Composition, OtherResource, Resource};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
