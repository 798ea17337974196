//! FHIR complex datatypes used by the notification model.
//!
//! Every type keeps unmodelled keys in a flattened `extra` map so documents survive a
//! parse/render cycle unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A code from a code system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Returns true if this coding belongs to `system`.
    pub fn is_system(&self, system: &str) -> bool {
        self.system.as_deref() == Some(system)
    }
}

/// A concept expressed as one or more codings plus optional text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    /// Code of the first coding, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.coding.first().and_then(|c| c.code.as_deref())
    }
}

/// Resource metadata: profiles and tags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Meta carrying a single profile.
    pub fn with_profile(profile: impl Into<String>) -> Self {
        Self {
            profile: vec![profile.into()],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_updated.is_none()
            && self.profile.is_empty()
            && self.tag.is_empty()
            && self.extra.is_empty()
    }

    pub fn has_profile(&self, profile: &str) -> bool {
        self.profile.iter().any(|p| p == profile)
    }

    /// Appends `coding` unless an identical tag is already present.
    ///
    /// Returns `true` if the tag was added.
    pub fn add_tag(&mut self, coding: Coding) -> bool {
        if self.tag.contains(&coding) {
            return false;
        }
        self.tag.push(coding);
        true
    }

    /// Replaces every tag of `coding`'s system with `coding`, keeping the tag single-valued.
    pub fn set_tag(&mut self, coding: Coding) {
        let system = coding.system.clone();
        self.tag.retain(|t| t.system != system);
        self.tag.push(coding);
    }

    /// Tags belonging to `system`, in document order.
    pub fn tags<'a>(&'a self, system: &'a str) -> impl Iterator<Item = &'a Coding> + 'a {
        self.tag.iter().filter(move |t| t.is_system(system))
    }
}

/// A business identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

/// A reference from one resource to another.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An extension. The `value[x]` and nested extensions are carried untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,

    #[serde(flatten)]
    pub content: Map<String, Value>,
}

/// A postal address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(rename = "postalCode", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Address {
    pub fn extension(&self, url: &str) -> Option<&Extension> {
        self.extension.iter().find(|e| e.url == url)
    }
}
