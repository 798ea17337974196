//! Arena-backed notification bundle.
//!
//! A notification is a graph of records that reference each other (`Composition.subject`
//! points at the notified person, observations point at specimens, ...). Rather than model
//! the graph with shared pointers, the bundle stores its entries in a `Vec` (the arena) and
//! keeps an index from every logical reference (`fullUrl` and `Type/id`) to the entry's slot.
//!
//! Consequences:
//! - a deep copy is a plain `Clone` of the arena and index
//! - replacing a record (e.g. swapping the notified person for a de-identified one) is a
//!   slot write followed by re-indexing that slot
//!
//! Responsibilities:
//! - Parse/render FHIR JSON with path-aware error messages
//! - Resolve references and locate the composition and its subject
//! - Provide in-place slot replacement and filtering for the transforms

use crate::datatypes::{Identifier, Meta};
use crate::patient::Patient;
use crate::resource::{Composition, Resource};
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One bundle entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "fullUrl", skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    pub resource: Resource,
}

impl Entry {
    pub fn new(full_url: Option<String>, resource: Resource) -> Self {
        Self { full_url, resource }
    }
}

/// A notification document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
    pub id: Option<String>,
    pub meta: Meta,
    pub identifier: Option<Identifier>,
    pub bundle_type: Option<String>,
    pub timestamp: Option<String>,
    extra: Map<String, Value>,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Bundle {
    /// An empty bundle of the given FHIR bundle type (`document`, `collection`, ...).
    pub fn new(bundle_type: impl Into<String>) -> Self {
        Self {
            bundle_type: Some(bundle_type.into()),
            ..Self::default()
        }
    }

    /// Parse a bundle from FHIR JSON text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort path (e.g. `entry[2].resource`)
    /// to the failing field.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the JSON does not match the bundle wire model,
    /// - resourceType is not "Bundle",
    /// - an entry resource lacks a resourceType.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire: BundleWire = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|err| {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                FhirError::Translation(format!("Bundle schema mismatch at {path}: {source}"))
            })?;
        Self::from_wire(wire)
    }

    /// Build a bundle from an already-parsed JSON value.
    pub fn from_value(value: Value) -> FhirResult<Self> {
        let wire: BundleWire = serde_json::from_value(value)?;
        Self::from_wire(wire)
    }

    /// Render this bundle as compact FHIR JSON.
    pub fn render(&self) -> FhirResult<String> {
        serde_json::to_string(self)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise bundle: {e}")))
    }

    /// Render this bundle as a JSON value.
    pub fn to_value(&self) -> FhirResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_wire(wire: BundleWire) -> FhirResult<Self> {
        if wire.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                wire.resource_type
            )));
        }

        let mut bundle = Self {
            id: wire.id,
            meta: wire.meta.unwrap_or_default(),
            identifier: wire.identifier,
            bundle_type: wire.bundle_type,
            timestamp: wire.timestamp,
            extra: wire.extra,
            entries: wire.entry,
            index: HashMap::new(),
        };
        bundle.reindex();
        Ok(bundle)
    }

    /// Business identifier value (`Bundle.identifier.value`).
    pub fn identifier_value(&self) -> Option<&str> {
        self.identifier.as_ref().and_then(|i| i.value.as_deref())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry and returns its slot.
    pub fn push(&mut self, entry: Entry) -> usize {
        let slot = self.entries.len();
        self.entries.push(entry);
        self.index_slot(slot);
        slot
    }

    pub fn resource(&self, slot: usize) -> Option<&Resource> {
        self.entries.get(slot).map(|e| &e.resource)
    }

    /// Slot of the entry a reference points at (`fullUrl` or `Type/id`).
    pub fn slot_of(&self, reference: &str) -> Option<usize> {
        self.index.get(reference).copied()
    }

    /// Resolve a reference to its resource.
    pub fn resolve(&self, reference: &str) -> Option<&Resource> {
        self.slot_of(reference).and_then(|slot| self.resource(slot))
    }

    /// Replaces the resource in `slot`, returning the previous one.
    ///
    /// The entry's `fullUrl` is kept, so references to the slot stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if `slot` is out of range.
    pub fn replace_resource(&mut self, slot: usize, resource: Resource) -> FhirResult<Resource> {
        let entry = self.entries.get_mut(slot).ok_or_else(|| {
            FhirError::InvalidInput(format!("bundle has no entry at slot {slot}"))
        })?;
        let previous = std::mem::replace(&mut entry.resource, resource);
        // The id may have changed.
        self.reindex();
        Ok(previous)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        self.entries.retain(|entry| keep(entry));
        self.reindex();
    }

    /// Resources of the given type, in document order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.entries
            .iter()
            .map(|e| &e.resource)
            .filter(move |r| r.resource_type() == resource_type)
    }

    pub fn composition_slot(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e.resource, Resource::Composition(_)))
    }

    pub fn composition(&self) -> Option<&Composition> {
        self.composition_slot()
            .and_then(|slot| self.resource(slot))
            .and_then(Resource::as_composition)
    }

    pub fn composition_mut(&mut self) -> Option<&mut Composition> {
        let slot = self.composition_slot()?;
        match &mut self.entries[slot].resource {
            Resource::Composition(c) => Some(c),
            _ => None,
        }
    }

    /// Slot of the notified person.
    ///
    /// Follows `Composition.subject` when it resolves to a patient, otherwise falls back to
    /// the first patient in the bundle.
    pub fn subject_slot(&self) -> Option<usize> {
        let via_composition = self
            .composition()
            .and_then(Composition::subject_reference)
            .and_then(|reference| self.slot_of(reference))
            .filter(|slot| matches!(self.entries[*slot].resource, Resource::Patient(_)));

        via_composition.or_else(|| {
            self.entries
                .iter()
                .position(|e| matches!(e.resource, Resource::Patient(_)))
        })
    }

    pub fn subject(&self) -> Option<&Patient> {
        self.subject_slot()
            .and_then(|slot| self.resource(slot))
            .and_then(Resource::as_patient)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for slot in 0..self.entries.len() {
            self.index_slot(slot);
        }
    }

    fn index_slot(&mut self, slot: usize) {
        let entry = &self.entries[slot];
        if let Some(full_url) = &entry.full_url {
            self.index.insert(full_url.clone(), slot);
        }
        if let Some(id) = entry.resource.id() {
            let key = format!("{}/{}", entry.resource.resource_type(), id);
            self.index.entry(key).or_insert(slot);
        }
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Owned wire representation used for parsing.
#[derive(Deserialize)]
struct BundleWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    meta: Option<Meta>,

    #[serde(default)]
    identifier: Option<Identifier>,

    #[serde(rename = "type", default)]
    bundle_type: Option<String>,

    #[serde(default)]
    timestamp: Option<String>,

    #[serde(default)]
    entry: Vec<Entry>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Borrowed wire representation used for rendering without cloning the arena.
#[derive(Serialize)]
struct BundleWireRef<'a> {
    #[serde(rename = "resourceType")]
    resource_type: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,

    #[serde(skip_serializing_if = "Meta::is_empty")]
    meta: &'a Meta,

    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a Identifier>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    bundle_type: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,

    #[serde(skip_serializing_if = "<[Entry]>::is_empty")]
    entry: &'a [Entry],

    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl Serialize for Bundle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BundleWireRef {
            resource_type: "Bundle",
            id: self.id.as_deref(),
            meta: &self.meta,
            identifier: self.identifier.as_ref(),
            bundle_type: self.bundle_type.as_deref(),
            timestamp: self.timestamp.as_deref(),
            entry: &self.entries,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bundle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = BundleWire::deserialize(deserializer)?;
        Bundle::from_wire(wire).map_err(serde::de::Error::custom)
    }
}
