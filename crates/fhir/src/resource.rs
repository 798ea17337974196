//! Resource dispatch for bundle entries.
//!
//! Entries are dispatched on `resourceType`: the two resource kinds the pipeline rewrites are
//! parsed into typed structs, everything else is kept as an [`OtherResource`] JSON body.

use crate::datatypes::{CodeableConcept, Meta, Reference};
use crate::patient::Patient;
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The document's primary descriptive record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub composition_type: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Composition {
    /// Reference string of the subject, if present.
    pub fn subject_reference(&self) -> Option<&str> {
        self.subject.as_ref().and_then(|s| s.reference.as_deref())
    }
}

/// Any resource the pipeline does not rewrite, carried verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct OtherResource {
    pub resource_type: String,
    pub id: Option<String>,
    /// All remaining fields (everything except `resourceType` and `id`).
    pub body: Map<String, Value>,
}

impl OtherResource {
    pub fn new(resource_type: impl Into<String>, id: Option<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id,
            body: Map::new(),
        }
    }

    /// `code.coding[0].code` of this resource, if present.
    pub fn first_code(&self) -> Option<&str> {
        self.body
            .get("code")?
            .get("coding")?
            .get(0)?
            .get("code")?
            .as_str()
    }
}

/// A bundle entry's resource.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    Composition(Composition),
    Patient(Patient),
    Other(OtherResource),
}

impl Resource {
    pub fn resource_type(&self) -> &str {
        match self {
            Resource::Composition(_) => "Composition",
            Resource::Patient(_) => "Patient",
            Resource::Other(other) => &other.resource_type,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Composition(c) => c.id.as_deref(),
            Resource::Patient(p) => p.id.as_deref(),
            Resource::Other(o) => o.id.as_deref(),
        }
    }

    pub fn as_patient(&self) -> Option<&Patient> {
        match self {
            Resource::Patient(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_composition(&self) -> Option<&Composition> {
        match self {
            Resource::Composition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_other(&self) -> Option<&OtherResource> {
        match self {
            Resource::Other(o) => Some(o),
            _ => None,
        }
    }

    /// Build a resource from a JSON object carrying `resourceType`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if the value is not an object or lacks a string
    /// `resourceType`, and [`FhirError::InvalidJson`] if a typed resource does not match its
    /// model.
    pub fn from_value(value: Value) -> FhirResult<Self> {
        let Value::Object(mut map) = value else {
            return Err(FhirError::InvalidInput(
                "resource must be a JSON object".into(),
            ));
        };

        let resource_type = match map.remove("resourceType") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => {
                return Err(FhirError::InvalidInput(
                    "resource is missing resourceType".into(),
                ))
            }
        };

        match resource_type.as_str() {
            "Composition" => Ok(Resource::Composition(serde_json::from_value(
                Value::Object(map),
            )?)),
            "Patient" => Ok(Resource::Patient(serde_json::from_value(Value::Object(
                map,
            ))?)),
            _ => {
                let id = match map.remove("id") {
                    None => None,
                    Some(Value::String(s)) => Some(s),
                    Some(other) => {
                        return Err(FhirError::InvalidInput(format!(
                            "{resource_type}.id must be a string, got {other}"
                        )))
                    }
                };
                Ok(Resource::Other(OtherResource {
                    resource_type,
                    id,
                    body: map,
                }))
            }
        }
    }

    /// Render this resource as a JSON object including `resourceType`.
    pub fn to_value(&self) -> FhirResult<Value> {
        let mut map = match self {
            Resource::Composition(c) => into_object(serde_json::to_value(c)?)?,
            Resource::Patient(p) => into_object(serde_json::to_value(p)?)?,
            Resource::Other(o) => {
                let mut map = o.body.clone();
                if let Some(id) = &o.id {
                    map.insert("id".into(), Value::String(id.clone()));
                }
                map
            }
        };
        map.insert(
            "resourceType".into(),
            Value::String(self.resource_type().to_string()),
        );
        Ok(Value::Object(map))
    }
}

fn into_object(value: Value) -> FhirResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FhirError::Translation(format!(
            "resource did not serialise to an object: {other}"
        ))),
    }
}

impl Serialize for Resource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Resource::from_value(value).map_err(serde::de::Error::custom)
    }
}
