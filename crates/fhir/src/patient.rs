//! FHIR-aligned patient (notified person) model.
//!
//! The de-identification transforms rebuild this record field by field, so every field they
//! copy, truncate or drop is modelled explicitly. Names, telecoms and any other identifying
//! content stay in [`Patient::extra`] and are discarded simply by not copying it.
//!
//! Notes:
//! - `birthDate` is kept as the raw FHIR date string (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
//! - deceased status is `deceased[x]`, modelled as the two concrete choices

use crate::datatypes::{Address, Extension, Identifier, Meta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The subject of a notification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(rename = "birthDate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(rename = "deceasedBoolean", skip_serializing_if = "Option::is_none")]
    pub deceased_boolean: Option<bool>,

    #[serde(rename = "deceasedDateTime", skip_serializing_if = "Option::is_none")]
    pub deceased_date_time: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,

    /// Everything not modelled above (name, telecom, contact, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    /// First extension with the given URL.
    pub fn extension(&self, url: &str) -> Option<&Extension> {
        self.extension.iter().find(|e| e.url == url)
    }

    pub fn has_profile(&self, profile: &str) -> bool {
        self.meta.has_profile(profile)
    }
}
